//! Node Connectors
//!
//! Opens RPC clients to a node either on this machine or at a remote
//! address. The local path authenticates with a key derived from the node's
//! own root key, so it needs no key file of its own.

use async_trait::async_trait;
use k256::SecretKey;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::client::{LndcRpcClient, DEFAULT_CALL_TIMEOUT};
use super::RpcClient;
use crate::bootstrap::address::RemoteAddress;
use crate::bootstrap::keys::{read_key_file, KeyPair};
use crate::error::{BootstrapError, BootstrapResult};
use crate::lndc::hdkey::local_client_key;
use crate::lndc::LndcConn;

/// Root key file of a node running under the data directory
pub const LOCAL_NODE_KEY_FILE: &str = "privkey.hex";

/// Opens node connections for the bootstrap path
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// True when a node can be reached through the data directory
    fn local_available(&self, data_dir: &Path) -> bool;

    /// Connect to the node on this machine
    async fn connect_local(&self, data_dir: &Path, port: u16) -> BootstrapResult<Arc<dyn RpcClient>>;

    /// Connect to a remote node, pinning its identity
    async fn connect_remote(
        &self,
        address: &RemoteAddress,
        keys: &KeyPair,
    ) -> BootstrapResult<Arc<dyn RpcClient>>;
}

/// Connector speaking LNDC over TCP
#[derive(Debug, Clone)]
pub struct LndcConnector {
    /// Budget for TCP connect plus handshake
    connect_timeout: Duration,
    /// Per-call timeout for the resulting client
    call_timeout: Duration,
}

impl Default for LndcConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl LndcConnector {
    pub fn with_timeouts(connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            call_timeout,
        }
    }

    async fn dial(
        &self,
        socket_address: &str,
        key: &SecretKey,
        identity: Option<&str>,
    ) -> BootstrapResult<Arc<dyn RpcClient>> {
        debug!("Dialing {}", socket_address);
        let handshake = async {
            let stream = TcpStream::connect(socket_address).await?;
            LndcConn::connect(stream, key, identity).await
        };

        let conn = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                BootstrapError::Connect(format!(
                    "timed out after {}ms connecting to {}",
                    self.connect_timeout.as_millis(),
                    socket_address
                ))
            })??;

        info!("Session established with {}", conn.remote_address());
        Ok(Arc::new(LndcRpcClient::new(conn, self.call_timeout)))
    }
}

#[async_trait]
impl NodeConnector for LndcConnector {
    fn local_available(&self, data_dir: &Path) -> bool {
        data_dir.join(LOCAL_NODE_KEY_FILE).is_file()
    }

    async fn connect_local(&self, data_dir: &Path, port: u16) -> BootstrapResult<Arc<dyn RpcClient>> {
        let seed = read_key_file(&data_dir.join(LOCAL_NODE_KEY_FILE))
            .map_err(|e| BootstrapError::Connect(e.to_string()))?;
        let key = local_client_key(&seed)?;
        self.dial(&format!("127.0.0.1:{}", port), &key, None).await
    }

    async fn connect_remote(
        &self,
        address: &RemoteAddress,
        keys: &KeyPair,
    ) -> BootstrapResult<Arc<dyn RpcClient>> {
        self.dial(&address.socket_address(), keys.secret(), Some(&address.identity))
            .await
    }
}
