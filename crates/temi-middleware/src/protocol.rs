//! JSON frames exchanged with WebSocket clients.
//!
//! Every frame is a JSON object tagged by `op`:
//!
//! | Direction | `op` | Fields |
//! |---|---|---|
//! | client → bridge | `call` | `id`, `method`, `args` |
//! | client → bridge | `listen` | `channel` |
//! | client → bridge | `cancel` | `channel` |
//! | bridge → client | `reply` | `id`, `result` |
//! | bridge → client | `event` | `channel`, `event` |
//! | bridge → client | `endOfStream` | `channel` |
//! | bridge → client | `error` | `message` |

use serde::{Deserialize, Serialize};
use temi_types::{BridgeError, BridgeEvent, Reply, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientFrame {
    Call {
        id: u64,
        method: String,
        #[serde(default)]
        args: Value,
    },
    Listen {
        channel: String,
    },
    Cancel {
        channel: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerFrame {
    Reply { id: u64, result: CallResult },
    Event { channel: String, event: BridgeEvent },
    EndOfStream { channel: String },
    Error { message: String },
}

/// Wire form of a [`Reply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CallResult {
    Success { value: Value },
    Error { code: String, message: String },
    NotImplemented,
}

impl From<Reply> for CallResult {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Success(value) => CallResult::Success { value },
            Reply::Failure(BridgeError::Unrecognized(_)) => CallResult::NotImplemented,
            Reply::Failure(e) => CallResult::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        }
    }
}

pub fn decode_client_frame(text: &str) -> Result<ClientFrame, BridgeError> {
    serde_json::from_str(text).map_err(|e| BridgeError::Serialization(e.to_string()))
}

pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, BridgeError> {
    serde_json::to_string(frame).map_err(|e| BridgeError::Serialization(e.to_string()))
}
