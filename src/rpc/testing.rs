//! In-process fake node for RPC tests
//!
//! Accepts LNDC sessions on an ephemeral port and answers:
//! - `LitRPC.Echo` with its arguments
//! - `LitRPC.Fail` with the error `boom`
//! - `LitRPC.Slow` never
//! - `LitRPC.Hangup` by closing the session

use k256::SecretKey;
use tokio::net::{TcpListener, TcpStream};

use super::message::{RpcRequest, RpcResponse};
use crate::lndc::LndcConn;

pub(crate) fn node_key() -> SecretKey {
    SecretKey::from_slice(&[0x42u8; 32]).unwrap()
}

/// Start the node and return its port
pub(crate) async fn spawn_fake_node(key: SecretKey) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let key = key.clone();
            tokio::spawn(serve_session(stream, key));
        }
    });
    port
}

async fn serve_session(stream: TcpStream, key: SecretKey) {
    let Ok(mut conn) = LndcConn::accept(stream, &key).await else {
        return;
    };
    while let Ok(msg) = conn.read_message().await {
        let Ok(request) = RpcRequest::decode(&msg) else {
            continue;
        };
        let outcome = match request.method.as_str() {
            "LitRPC.Echo" => Ok(request.args),
            "LitRPC.Fail" => Err("boom".to_string()),
            "LitRPC.Slow" => continue,
            "LitRPC.Hangup" => return,
            other => Err(format!("rpc: can't find method {}", other)),
        };
        let response = RpcResponse {
            idx: request.idx,
            method: request.method,
            outcome,
        };
        if conn.write_message(&response.encode().unwrap()).await.is_err() {
            return;
        }
    }
}
