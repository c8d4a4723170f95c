//! Connection Strategy Selection
//!
//! Decides once, at startup, whether to attach to a node on this machine or
//! to a remote node, then opens the connection. There is no fallback between
//! the two and no retry.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::info;

use super::address::ConnectionTarget;
use super::keys::KeyProvider;
use crate::error::{BootstrapError, BootstrapResult};
use crate::lndc::lit_address_ok;
use crate::rpc::{NodeConnector, RpcClient};

/// How the shell reaches the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStrategy {
    Local,
    Remote,
}

impl fmt::Display for ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStrategy::Local => write!(f, "local"),
            ConnectionStrategy::Remote => write!(f, "remote"),
        }
    }
}

/// Local only when a node is available here, no identity was given and the
/// host is this machine
pub fn select_strategy(target: &ConnectionTarget, local_available: bool) -> ConnectionStrategy {
    if local_available && !target.has_identity() && target.host.is_local() {
        ConnectionStrategy::Local
    } else {
        ConnectionStrategy::Remote
    }
}

/// An open node connection and how it was reached
pub struct Connection {
    pub strategy: ConnectionStrategy,
    pub client: Arc<dyn RpcClient>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("strategy", &self.strategy)
            .field("remote", &self.client.remote_address())
            .finish()
    }
}

/// Select a strategy for `target` and connect with it.
///
/// On the remote path the identity is validated before any key is loaded,
/// and the key is loaded before any network activity.
pub async fn establish(
    target: &ConnectionTarget,
    data_dir: &Path,
    connector: &dyn NodeConnector,
    keys: &dyn KeyProvider,
) -> BootstrapResult<Connection> {
    let strategy = select_strategy(target, connector.local_available(data_dir));
    info!("Using {} connection strategy", strategy);

    let client = match strategy {
        ConnectionStrategy::Local => connector.connect_local(data_dir, target.port).await?,
        ConnectionStrategy::Remote => {
            if !lit_address_ok(&target.identity) {
                return Err(BootstrapError::InvalidAddress(target.identity.clone()));
            }
            let key_pair = keys.load()?;
            let address = target.remote_address();
            info!(
                "Connecting to {} using pubkey {}",
                address,
                hex::encode(key_pair.public_key())
            );
            connector.connect_remote(&address, &key_pair).await?
        }
    };

    Ok(Connection { strategy, client })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::address::RemoteAddress;
    use crate::bootstrap::keys::KeyPair;
    use crate::lndc::lit_address_from_pubkey;
    use crate::rpc::{RpcError, RpcResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct NullClient;

    #[async_trait]
    impl RpcClient for NullClient {
        async fn call(&self, method: &str, _args: serde_json::Value) -> RpcResult<serde_json::Value> {
            Err(RpcError::Remote(format!("{} unsupported", method)))
        }

        fn remote_address(&self) -> String {
            "null".to_string()
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        local: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeConnector for FakeConnector {
        fn local_available(&self, _data_dir: &Path) -> bool {
            self.local
        }

        async fn connect_local(&self, _data_dir: &Path, port: u16) -> BootstrapResult<Arc<dyn RpcClient>> {
            self.calls.lock().push(format!("local:{}", port));
            Ok(Arc::new(NullClient))
        }

        async fn connect_remote(
            &self,
            address: &RemoteAddress,
            _keys: &KeyPair,
        ) -> BootstrapResult<Arc<dyn RpcClient>> {
            self.calls.lock().push(format!("remote:{}", address));
            Ok(Arc::new(NullClient))
        }
    }

    #[derive(Default)]
    struct CountingKeys {
        loads: AtomicUsize,
        missing: bool,
    }

    impl KeyProvider for CountingKeys {
        fn load(&self) -> BootstrapResult<KeyPair> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.missing {
                return Err(BootstrapError::key_load("/nowhere/lit-af-key.hex", "not found"));
            }
            Ok(KeyPair::from_secret_bytes(&[3u8; 32]).unwrap())
        }
    }

    fn valid_identity() -> String {
        let mut key = [0x22u8; 33];
        key[0] = 0x03;
        lit_address_from_pubkey(&key)
    }

    fn target(s: &str) -> ConnectionTarget {
        ConnectionTarget::parse(s).unwrap()
    }

    #[test]
    fn test_selection_rules() {
        assert_eq!(select_strategy(&target("@:2448"), true), ConnectionStrategy::Local);
        assert_eq!(select_strategy(&target("@localhost:9"), true), ConnectionStrategy::Local);
        assert_eq!(select_strategy(&target("@127.0.0.1"), true), ConnectionStrategy::Local);
        assert_eq!(select_strategy(&target("@:2448"), false), ConnectionStrategy::Remote);
        assert_eq!(select_strategy(&target("@10.1.1.1:2448"), true), ConnectionStrategy::Remote);
        assert_eq!(select_strategy(&target("x@:2448"), true), ConnectionStrategy::Remote);
    }

    #[tokio::test]
    async fn test_local_never_loads_keys() {
        let connector = FakeConnector {
            local: true,
            ..Default::default()
        };
        let keys = CountingKeys::default();

        let conn = establish(&target("@:2448"), Path::new("/data"), &connector, &keys)
            .await
            .unwrap();
        assert_eq!(conn.strategy, ConnectionStrategy::Local);
        assert_eq!(keys.loads.load(Ordering::SeqCst), 0);
        assert_eq!(*connector.calls.lock(), vec!["local:2448".to_string()]);
    }

    #[tokio::test]
    async fn test_identity_forces_remote_and_loads_key_once() {
        let connector = FakeConnector {
            local: true,
            ..Default::default()
        };
        let keys = CountingKeys::default();
        let identity = valid_identity();

        let conn = establish(
            &target(&format!("{}@127.0.0.1:2448", identity)),
            Path::new("/data"),
            &connector,
            &keys,
        )
        .await
        .unwrap();
        assert_eq!(conn.strategy, ConnectionStrategy::Remote);
        assert_eq!(keys.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            *connector.calls.lock(),
            vec![format!("remote:{}@127.0.0.1:2448", identity)]
        );
    }

    #[tokio::test]
    async fn test_invalid_identity_fails_before_keys() {
        let connector = FakeConnector::default();
        let keys = CountingKeys::default();

        let err = establish(&target("bogus@10.0.0.5:2448"), Path::new("/data"), &connector, &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidAddress(_)));
        assert_eq!(keys.loads.load(Ordering::SeqCst), 0);
        assert!(connector.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_identity_without_local_node_is_invalid() {
        let connector = FakeConnector::default();
        let keys = CountingKeys::default();

        let err = establish(&target("@:2448"), Path::new("/data"), &connector, &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_missing_key_stops_before_connecting() {
        let connector = FakeConnector::default();
        let keys = CountingKeys {
            missing: true,
            ..Default::default()
        };

        let err = establish(
            &target(&format!("{}@10.0.0.5:2448", valid_identity())),
            Path::new("/data"),
            &connector,
            &keys,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BootstrapError::KeyLoad { .. }));
        assert!(connector.calls.lock().is_empty());
    }
}
