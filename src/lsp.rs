//! Generic LSP transport layer: Content-Length framing over stdio pipes and
//! request/response correlation on top of it.

pub mod error;
pub mod framing;
pub mod protocol;
pub mod requests;
pub mod session;
pub mod stdio_transport;
pub mod transport;
pub mod types;

pub use error::LspError;
pub use session::Session;
