//! Node RPC Module
//!
//! RPC calls to a lit node carried over an LNDC session:
//! - Request/response framing keyed by a per-call index
//! - A client that multiplexes concurrent calls over one session
//! - Connectors that open local or remote sessions

pub mod client;
pub mod connector;
pub mod message;

#[cfg(test)]
pub(crate) mod testing;

pub use client::LndcRpcClient;
pub use connector::{LndcConnector, NodeConnector, LOCAL_NODE_KEY_FILE};

use async_trait::async_trait;
use thiserror::Error;

use crate::lndc::LndcError;

/// Call-time RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("{0}")]
    Remote(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] LndcError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for RPC calls
pub type RpcResult<T> = Result<T, RpcError>;

/// A connected node RPC endpoint
#[async_trait]
pub trait RpcClient: Send + Sync + std::fmt::Debug {
    /// Invoke `method` (e.g. `LitRPC.Balance`) with JSON arguments
    async fn call(&self, method: &str, args: serde_json::Value) -> RpcResult<serde_json::Value>;

    /// Address of the node this client talks to
    fn remote_address(&self) -> String;

    /// False once the underlying session has ended
    fn is_connected(&self) -> bool;
}
