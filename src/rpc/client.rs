//! LNDC RPC Client
//!
//! Multiplexes concurrent RPC calls over one encrypted session. Each call is
//! tagged with an index; a reader task routes responses back to the waiting
//! caller. When the session drops, every pending call fails.

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, warn};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::message::{is_response, RpcRequest, RpcResponse};
use super::{RpcClient, RpcError, RpcResult};
use crate::lndc::{LndcConn, LndcWriter};

type Pending = DashMap<u64, oneshot::Sender<Result<Value, String>>>;

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// RPC client bound to one LNDC session
pub struct LndcRpcClient<S> {
    /// Sending half of the session
    writer: Mutex<LndcWriter<WriteHalf<S>>>,
    /// In-flight calls (idx -> reply channel)
    pending: Arc<Pending>,
    /// Index for the next call
    next_idx: AtomicU64,
    /// Set once the session has ended, with the reason
    closed: Arc<RwLock<Option<String>>>,
    remote_address: String,
    timeout: Duration,
    reader: JoinHandle<()>,
}

impl<S> LndcRpcClient<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an established session and start routing responses
    pub fn new(conn: LndcConn<S>, timeout: Duration) -> Self {
        let remote_address = conn.remote_address();
        let (mut reader, writer) = conn.into_split();

        let pending: Arc<Pending> = Arc::new(DashMap::new());
        let closed = Arc::new(RwLock::new(None));

        let task_pending = pending.clone();
        let task_closed = closed.clone();
        let task_remote = remote_address.clone();
        let reader = tokio::spawn(async move {
            loop {
                let msg = match reader.read_message().await {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Session with {} ended: {}", task_remote, e);
                        *task_closed.write() = Some(e.to_string());
                        // Dropping the senders wakes every waiting caller
                        task_pending.clear();
                        break;
                    }
                };

                if !is_response(&msg) {
                    debug!("Ignoring non-RPC message (type 0x{:02x?})", msg.first());
                    continue;
                }

                match RpcResponse::decode(&msg) {
                    Ok(response) => match task_pending.remove(&response.idx) {
                        Some((_, tx)) => {
                            let _ = tx.send(response.outcome);
                        }
                        None => warn!(
                            "Response {} for {} matches no pending call",
                            response.idx, response.method
                        ),
                    },
                    Err(e) => error!("Dropping malformed response: {}", e),
                }
            }
        });

        Self {
            writer: Mutex::new(writer),
            pending,
            next_idx: AtomicU64::new(1),
            closed,
            remote_address,
            timeout,
            reader,
        }
    }

    fn closed_reason(&self) -> Option<String> {
        self.closed.read().clone()
    }

    /// Number of calls awaiting a response
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl<S> RpcClient for LndcRpcClient<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn call(&self, method: &str, args: Value) -> RpcResult<Value> {
        if let Some(reason) = self.closed_reason() {
            return Err(RpcError::Closed(reason));
        }

        let idx = self.next_idx.fetch_add(1, Ordering::SeqCst);
        let frame = RpcRequest {
            idx,
            method: method.to_string(),
            args,
        }
        .encode()?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(idx, tx);
        if let Some(reason) = self.closed_reason() {
            self.pending.remove(&idx);
            return Err(RpcError::Closed(reason));
        }

        debug!("Sending RPC request: {} (idx: {})", method, idx);
        let sent = self.writer.lock().await.write_message(&frame).await;
        if let Err(e) = sent {
            self.pending.remove(&idx);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(RpcError::Remote(message)),
            Ok(Err(_)) => Err(RpcError::Closed(
                self.closed_reason()
                    .unwrap_or_else(|| "session closed".to_string()),
            )),
            Err(_) => {
                self.pending.remove(&idx);
                Err(RpcError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    fn remote_address(&self) -> String {
        self.remote_address.clone()
    }

    fn is_connected(&self) -> bool {
        self.closed_reason().is_none() && !self.reader.is_finished()
    }
}

impl<S> Drop for LndcRpcClient<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl<S> std::fmt::Debug for LndcRpcClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LndcRpcClient")
            .field("remote_address", &self.remote_address)
            .field("pending", &self.pending.len())
            .field("closed", &self.closed)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{node_key, spawn_fake_node};
    use k256::SecretKey;
    use serde_json::json;
    use tokio::net::TcpStream;

    async fn connect(port: u16, timeout: Duration) -> LndcRpcClient<TcpStream> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let key = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let conn = LndcConn::connect(stream, &key, None).await.unwrap();
        LndcRpcClient::new(conn, timeout)
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let port = spawn_fake_node(node_key()).await;
        let client = connect(port, DEFAULT_CALL_TIMEOUT).await;

        assert!(client.is_connected());
        let result = client
            .call("LitRPC.Echo", json!({ "hello": "node" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "hello": "node" }));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_is_reported() {
        let port = spawn_fake_node(node_key()).await;
        let client = connect(port, DEFAULT_CALL_TIMEOUT).await;

        let err = client.call("LitRPC.Fail", Value::Null).await.unwrap_err();
        assert!(matches!(err, RpcError::Remote(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_routed() {
        let port = spawn_fake_node(node_key()).await;
        let client = Arc::new(connect(port, DEFAULT_CALL_TIMEOUT).await);

        let mut handles = Vec::new();
        for i in 0..20 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.call("LitRPC.Echo", json!(i)).await.unwrap()
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), json!(i));
        }
    }

    #[tokio::test]
    async fn test_unanswered_call_times_out() {
        let port = spawn_fake_node(node_key()).await;
        let client = connect(port, Duration::from_millis(100)).await;

        let err = client.call("LitRPC.Slow", Value::Null).await.unwrap_err();
        assert!(matches!(err, RpcError::Timeout(100)));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_closed_session_fails_calls() {
        let port = spawn_fake_node(node_key()).await;
        let client = connect(port, DEFAULT_CALL_TIMEOUT).await;

        let err = client.call("LitRPC.Hangup", Value::Null).await.unwrap_err();
        assert!(matches!(err, RpcError::Closed(_)));
        assert!(!client.is_connected());

        let err = client.call("LitRPC.Echo", Value::Null).await.unwrap_err();
        assert!(matches!(err, RpcError::Closed(_)));
    }
}
