use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::rpc::RpcClient;

/// Outgoing replies buffered per websocket
const WS_SEND_QUEUE: usize = 64;

/// A call from the page
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl ProxyRequest {
    /// Arguments for the node: the first element of an array, else `params`
    pub fn args(&self) -> Value {
        match &self.params {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        }
    }
}

/// Reply to the page; exactly one of `result`/`error` is present
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProxyResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Build the proxy router around a connected client
pub fn build_router(client: Arc<dyn RpcClient>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/oneoff", post(oneoff_handler))
        .route("/health", get(health_handler))
        .with_state(client)
        .layer(CorsLayer::permissive())
}

/// Parse one raw request and run it against the node
async fn dispatch(client: &dyn RpcClient, raw: &str) -> ProxyResponse {
    let request: ProxyRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => return ProxyResponse::err(Value::Null, format!("invalid request: {}", e)),
    };

    debug!("Proxying {} (id: {})", request.method, request.id);
    let args = request.args();
    match client.call(&request.method, args).await {
        Ok(result) => ProxyResponse::ok(request.id, result),
        Err(e) => {
            warn!("{} failed: {}", request.method, e);
            ProxyResponse::err(request.id, e.to_string())
        }
    }
}

async fn oneoff_handler(
    State(client): State<Arc<dyn RpcClient>>,
    body: String,
) -> Json<ProxyResponse> {
    Json(dispatch(client.as_ref(), &body).await)
}

async fn health_handler(State(client): State<Arc<dyn RpcClient>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "connected": client.is_connected() }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(client): State<Arc<dyn RpcClient>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client))
}

/// Calls on one socket run concurrently; replies go out in completion order.
async fn handle_socket(socket: WebSocket, client: Arc<dyn RpcClient>) {
    info!("Page connected to proxy");
    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(WS_SEND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            if sink.send(Message::Text(reply.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Websocket read failed: {}", e);
                break;
            }
        };

        let client = client.clone();
        let reply_tx = reply_tx.clone();
        tokio::spawn(async move {
            let response = dispatch(client.as_ref(), text.as_str()).await;
            match serde_json::to_string(&response) {
                Ok(json) => {
                    let _ = reply_tx.send(json).await;
                }
                Err(e) => warn!("Failed to encode proxy reply: {}", e),
            }
        });
    }

    drop(reply_tx);
    let _ = writer.await;
    info!("Page disconnected from proxy");
}
