//! LNDC Transport Module
//!
//! Encrypted, mutually authenticated sessions between this shell and a lit
//! node:
//! - Noise XX handshake over secp256k1 (ChaCha20-Poly1305, SHA-256)
//! - Length-prefixed encrypted framing with periodic key rotation
//! - Lit address encoding used to pin the remote node identity
//! - Hierarchical key derivation for local node connections

pub mod address;
pub mod conn;
pub mod hdkey;
pub mod noise;

pub use address::{lit_address_from_pubkey, lit_address_ok};
pub use conn::{LndcConn, LndcReader, LndcWriter};

use thiserror::Error;

/// Largest body carried by one transport message
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Transport errors
#[derive(Error, Debug)]
pub enum LndcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Remote identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Decryption failed")]
    Decrypt,

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// Result type alias for transport operations
pub type LndcResult<T> = Result<T, LndcError>;
