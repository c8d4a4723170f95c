//! Websocket Proxy
//!
//! Republishes the node RPC client on a local port so the GUI page can
//! reach it:
//! - `GET /ws` - JSON calls over a websocket
//! - `POST /oneoff` - a single JSON call over plain HTTP
//! - `GET /health` - liveness and node session state
//!
//! Serving runs on a background task owned by a [`ProxyHandle`].

mod routes;

pub use routes::{build_router, ProxyRequest, ProxyResponse};

use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ProxyEndpoint;
use crate::rpc::RpcClient;

/// Running proxy server
pub struct ProxyHandle {
    /// Port actually bound
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProxyHandle {
    /// Stop accepting connections and wait for the server task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!("Proxy task ended abnormally: {}", e);
        }
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind the proxy and start serving in the background.
///
/// Only binding can fail here; errors while serving are logged by the task.
pub async fn start_proxy(
    client: Arc<dyn RpcClient>,
    endpoint: &ProxyEndpoint,
) -> std::io::Result<ProxyHandle> {
    let listener =
        TcpListener::bind((endpoint.bind_host.as_str(), endpoint.bind_port)).await?;
    let local_addr = listener.local_addr()?;
    let router = build_router(client);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        match served {
            Ok(()) => info!("Proxy on {} stopped", local_addr),
            Err(e) => error!("Proxy on {} failed: {}", local_addr, e),
        }
    });

    info!("Websocket proxy listening on {}", local_addr);
    Ok(ProxyHandle {
        port: local_addr.port(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{RpcError, RpcResult};
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_tungstenite::tungstenite::Message;

    /// Answers every call with its method and arguments
    #[derive(Debug)]
    struct EchoClient {
        connected: AtomicBool,
    }

    impl EchoClient {
        fn new() -> Self {
            Self {
                connected: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl RpcClient for EchoClient {
        async fn call(&self, method: &str, args: Value) -> RpcResult<Value> {
            if method == "LitRPC.Fail" {
                return Err(RpcError::Remote("no such channel".to_string()));
            }
            Ok(json!({ "method": method, "args": args }))
        }

        fn remote_address(&self) -> String {
            "ln1test".to_string()
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    async fn start_test_proxy() -> ProxyHandle {
        let endpoint = ProxyEndpoint {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
        };
        start_proxy(Arc::new(EchoClient::new()), &endpoint).await.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let proxy = start_test_proxy().await;
        let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", proxy.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": "ok", "connected": true }));
        proxy.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_reports_lost_session() {
        let client = Arc::new(EchoClient::new());
        let endpoint = ProxyEndpoint {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
        };
        let proxy = start_proxy(client.clone(), &endpoint).await.unwrap();
        client.connected.store(false, Ordering::SeqCst);

        let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", proxy.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": "ok", "connected": false }));
        proxy.shutdown().await;
    }

    #[tokio::test]
    async fn test_oneoff_forwards_call() {
        let proxy = start_test_proxy().await;
        let http = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{}/oneoff", proxy.port);

        let body: Value = http
            .post(&url)
            .body(r#"{"method":"LitRPC.Balance","params":[{"coin":1}],"id":7}"#)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["id"], json!(7));
        assert_eq!(
            body["result"],
            json!({ "method": "LitRPC.Balance", "args": { "coin": 1 } })
        );
        assert!(body.get("error").is_none());

        let body: Value = http
            .post(&url)
            .body(r#"{"method":"LitRPC.Fail","id":"x"}"#)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["id"], json!("x"));
        assert!(body.get("result").is_none());
        assert_eq!(body["error"], json!("no such channel"));

        proxy.shutdown().await;
    }

    #[tokio::test]
    async fn test_websocket_calls() {
        let proxy = start_test_proxy().await;
        let (mut ws, _) =
            tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{}/ws", proxy.port))
                .await
                .unwrap();

        ws.send(Message::Text(
            r#"{"method":"LitRPC.Address","params":{"n":2},"id":1}"#.into(),
        ))
        .await
        .unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply["id"], json!(1));
        assert_eq!(reply["result"]["args"], json!({ "n": 2 }));

        ws.send(Message::Text("not json".into())).await.unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(reply["id"], Value::Null);
        assert!(reply["error"].as_str().unwrap().starts_with("invalid request"));

        ws.close(None).await.unwrap();
        proxy.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let proxy = start_test_proxy().await;
        let port = proxy.port;
        proxy.shutdown().await;

        let endpoint = ProxyEndpoint {
            bind_host: "127.0.0.1".to_string(),
            bind_port: port,
        };
        let again = start_proxy(Arc::new(EchoClient::new()), &endpoint).await.unwrap();
        assert_eq!(again.port, port);
        again.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let proxy = start_test_proxy().await;
        let endpoint = ProxyEndpoint {
            bind_host: "127.0.0.1".to_string(),
            bind_port: proxy.port,
        };
        assert!(start_proxy(Arc::new(EchoClient::new()), &endpoint).await.is_err());
        proxy.shutdown().await;
    }
}
