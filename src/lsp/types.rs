use std::fmt;

use serde::{Deserialize, Serialize};

/// JSON-RPC request id. The protocol allows integers and strings; both hash
/// so the pending registry can key on them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: RequestId, method: String, params: Option<serde_json::Value>) -> Self {
        Request {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResponseMessage {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: String, params: Option<serde_json::Value>) -> Self {
        Notification {
            jsonrpc: "2.0".to_string(),
            method,
            params,
        }
    }
}

/// One decoded incoming message: exactly one of the three JSON-RPC shapes,
/// decided by the presence of `id` and `method`.
#[derive(Debug)]
pub enum Message {
    Request(Request),
    Response(ResponseMessage),
    Notification(Notification),
}

/// Outbound shapes. The harness never sends responses.
#[derive(Debug)]
pub enum SendMessage {
    Request(Request),
    Notification(Notification),
}

impl SendMessage {
    /// Id carried by the message, if any.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            SendMessage::Request(request) => Some(&request.id),
            SendMessage::Notification(_) => None,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            SendMessage::Request(request) => &request.method,
            SendMessage::Notification(notification) => &notification.method,
        }
    }
}
