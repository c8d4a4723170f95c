//! Key Provider
//!
//! Loads the persisted secp256k1 keypair used to authenticate remote
//! sessions. Key files are never created here.

use std::fmt;
use std::path::{Path, PathBuf};

use k256::SecretKey;
use log::{debug, info};

use crate::error::{BootstrapError, BootstrapResult};
use crate::lndc::lit_address_from_pubkey;
use crate::lndc::noise::serialize_pubkey;

/// Key file name inside the data directory
pub const KEY_FILE_NAME: &str = "lit-af-key.hex";

const SECRET_LEN: usize = 32;

/// Secret key plus its compressed public key
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: [u8; 33],
}

impl KeyPair {
    /// Build a keypair from a 32-byte secret, deriving the public key
    pub fn from_secret_bytes(bytes: &[u8; SECRET_LEN]) -> Result<Self, String> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| "secret is not a valid secp256k1 scalar".to_string())?;
        let public = serialize_pubkey(&secret.public_key());
        Ok(Self { secret, public })
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Compressed public key (33 bytes)
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public
    }

    /// Lit address of this key
    pub fn lit_address(&self) -> String {
        lit_address_from_pubkey(&self.public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Source of the keypair for remote sessions
pub trait KeyProvider: Send + Sync {
    fn load(&self) -> BootstrapResult<KeyPair>;
}

/// Reads `lit-af-key.hex` from the data directory
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    path: PathBuf,
}

impl KeyFileProvider {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(KEY_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyProvider for KeyFileProvider {
    fn load(&self) -> BootstrapResult<KeyPair> {
        let secret = read_key_file(&self.path)?;
        let pair = KeyPair::from_secret_bytes(&secret)
            .map_err(|reason| BootstrapError::key_load(&self.path, reason))?;
        info!("Loaded key {} from {:?}", pair.lit_address(), self.path);
        Ok(pair)
    }
}

/// Read a 32-byte secret stored as 64 hex characters or as raw bytes
pub fn read_key_file(path: &Path) -> BootstrapResult<[u8; SECRET_LEN]> {
    let contents = std::fs::read(path).map_err(|e| BootstrapError::key_load(path, e.to_string()))?;
    debug!("Read {} bytes from key file {:?}", contents.len(), path);

    let decoded = match std::str::from_utf8(&contents) {
        Ok(text) if !text.trim().is_empty() => hex::decode(text.trim()).ok(),
        _ => None,
    };

    let bytes = match decoded {
        Some(bytes) => bytes,
        None if contents.len() == SECRET_LEN => contents,
        None => {
            return Err(BootstrapError::key_load(
                path,
                "contents are neither hex nor a raw 32-byte secret",
            ))
        }
    };

    <[u8; SECRET_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        BootstrapError::key_load(
            path,
            format!("key length is {}, expect {}", bytes.len(), SECRET_LEN),
        )
    })
}
