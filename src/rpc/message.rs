//! RPC Message Framing
//!
//! ```text
//! request   0xB0 | idx u64 BE | method | 0x00 | JSON args
//! response  0xB1 | idx u64 BE | method | 0x00 | status | body
//! ```
//!
//! A response status of 0 carries a JSON result, 1 carries UTF-8 error text.

use serde_json::Value;

use super::{RpcError, RpcResult};

pub const MSGID_RPC_REQUEST: u8 = 0xB0;
pub const MSGID_RPC_RESPONSE: u8 = 0xB1;

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

/// Splits `type | idx | method 0x00 | rest`
fn split_header(msg: &[u8], expected_type: u8) -> RpcResult<(u64, String, &[u8])> {
    if msg.len() < 10 {
        return Err(RpcError::Malformed(format!("{} byte message", msg.len())));
    }
    if msg[0] != expected_type {
        return Err(RpcError::Malformed(format!("unexpected message type 0x{:02x}", msg[0])));
    }

    let mut idx = [0u8; 8];
    idx.copy_from_slice(&msg[1..9]);
    let rest = &msg[9..];

    let nul = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| RpcError::Malformed("unterminated method name".to_string()))?;
    let method = std::str::from_utf8(&rest[..nul])
        .map_err(|_| RpcError::Malformed("method name is not UTF-8".to_string()))?
        .to_string();

    Ok((u64::from_be_bytes(idx), method, &rest[nul + 1..]))
}

fn write_header(out: &mut Vec<u8>, msg_type: u8, idx: u64, method: &str) {
    out.push(msg_type);
    out.extend_from_slice(&idx.to_be_bytes());
    out.extend_from_slice(method.as_bytes());
    out.push(0);
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub idx: u64,
    pub method: String,
    pub args: Value,
}

impl RpcRequest {
    pub fn encode(&self) -> RpcResult<Vec<u8>> {
        if self.method.as_bytes().contains(&0) {
            return Err(RpcError::Malformed("method name contains NUL".to_string()));
        }
        let mut out = Vec::new();
        write_header(&mut out, MSGID_RPC_REQUEST, self.idx, &self.method);
        serde_json::to_writer(&mut out, &self.args)?;
        Ok(out)
    }

    pub fn decode(msg: &[u8]) -> RpcResult<Self> {
        let (idx, method, body) = split_header(msg, MSGID_RPC_REQUEST)?;
        let args = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body)?
        };
        Ok(Self { idx, method, args })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub idx: u64,
    pub method: String,
    pub outcome: Result<Value, String>,
}

impl RpcResponse {
    pub fn encode(&self) -> RpcResult<Vec<u8>> {
        let mut out = Vec::new();
        write_header(&mut out, MSGID_RPC_RESPONSE, self.idx, &self.method);
        match &self.outcome {
            Ok(value) => {
                out.push(STATUS_OK);
                serde_json::to_writer(&mut out, value)?;
            }
            Err(message) => {
                out.push(STATUS_ERROR);
                out.extend_from_slice(message.as_bytes());
            }
        }
        Ok(out)
    }

    pub fn decode(msg: &[u8]) -> RpcResult<Self> {
        let (idx, method, body) = split_header(msg, MSGID_RPC_RESPONSE)?;
        let (status, body) = body
            .split_first()
            .ok_or_else(|| RpcError::Malformed("missing response status".to_string()))?;

        let outcome = match *status {
            STATUS_OK if body.is_empty() => Ok(Value::Null),
            STATUS_OK => Ok(serde_json::from_slice(body)?),
            STATUS_ERROR => Err(String::from_utf8_lossy(body).into_owned()),
            other => {
                return Err(RpcError::Malformed(format!("unknown response status {}", other)))
            }
        };
        Ok(Self { idx, method, outcome })
    }
}

/// True when a raw session message is an RPC response
pub fn is_response(msg: &[u8]) -> bool {
    msg.first() == Some(&MSGID_RPC_RESPONSE)
}
