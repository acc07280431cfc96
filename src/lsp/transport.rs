//! Transport abstraction between the session and its peer.

use async_trait::async_trait;

use crate::lsp::error::LspError;
use crate::lsp::types::SendMessage;

/// Object-safe async transport carrying framed JSON-RPC traffic.
///
/// - `send` frames the message (Content-Length) and writes it out.
/// - `read` returns the next frame's JSON body with the header stripped.
///
/// The session holds a boxed transport so callers (and tests) can provide
/// their own byte streams in place of child-process pipes.
#[async_trait]
pub trait LspTransport: Send + Sync {
    async fn send(&mut self, message: &SendMessage) -> Result<(), LspError>;
    async fn read(&mut self) -> Result<String, LspError>;
}
