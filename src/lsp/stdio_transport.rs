// child-process stdio transport: framed pipes to a spawned language server

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::lsp::error::LspError;
use crate::lsp::framing;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::SendMessage;

pub struct StdioTransport {
    writer: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl StdioTransport {
    pub fn new(writer: ChildStdin, reader: BufReader<ChildStdout>) -> Self {
        StdioTransport { writer, reader }
    }
}

#[async_trait]
impl LspTransport for StdioTransport {
    async fn send(&mut self, message: &SendMessage) -> Result<(), LspError> {
        framing::write_frame(&mut self.writer, message).await?;
        log::trace!("sent {}", message.method());
        Ok(())
    }

    async fn read(&mut self) -> Result<String, LspError> {
        let body = framing::read_frame(&mut self.reader).await?;
        log::trace!("received {} body bytes", body.len());
        Ok(body)
    }
}

/// Spawn the language server with stdin/stdout piped and stderr inherited,
/// so its diagnostics land on the harness's own stderr without ever being
/// parsed. The child is killed if its handle is dropped without an explicit
/// close.
pub fn spawn_server(exe: &str, args: &[String]) -> Result<(Child, StdioTransport), LspError> {
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LspError::Spawn {
            command: exe.to_string(),
            source,
        })?;

    let writer = child.stdin.take().ok_or_else(|| LspError::Spawn {
        command: exe.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "child stdin was not piped"),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| LspError::Spawn {
        command: exe.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "child stdout was not piped"),
    })?;

    Ok((child, StdioTransport::new(writer, BufReader::new(stdout))))
}
