use std::time::Duration;

use crate::lsp::types::RequestId;

/// Transport failures, ordered roughly by where they strike: spawning,
/// encoding, the byte stream, correlation, and session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("failed to spawn language server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("message is not serializable as JSON: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The server closed its output stream. Expected after shutdown,
    /// terminal anywhere else.
    #[error("server closed its output stream")]
    StreamClosed,

    #[error("frame truncated: header declared {expected} body bytes, stream ended after {read}")]
    TruncatedFrame { expected: usize, read: usize },

    #[error("malformed frame header: {0}")]
    MalformedHeader(String),

    #[error("malformed message body: {0}")]
    MalformedBody(String),

    #[error("session ended before a response for request {id} arrived")]
    ResponseNeverArrived { id: RequestId },

    #[error("no response for request {id} within {timeout:?}")]
    Timeout { id: RequestId, timeout: Duration },

    #[error("session is closed")]
    SessionClosed,

    #[error("i/o failure on server pipe: {0}")]
    Io(#[from] std::io::Error),
}
