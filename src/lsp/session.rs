//! Transport session: sequences JSON-RPC traffic over a live pipe to a
//! spawned language server and correlates requests to responses.

use std::collections::HashSet;
use std::time::Duration;

use tokio::process::Child;

use crate::lsp::error::LspError;
use crate::lsp::protocol;
use crate::lsp::stdio_transport;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::{Message, Notification, Request, RequestId, ResponseMessage, SendMessage};

#[derive(Debug, PartialEq)]
enum SessionState {
    Open,
    Closing,
    Closed,
}

pub struct Session {
    transport: Box<dyn LspTransport>,
    child: Option<Child>,
    pending: HashSet<RequestId>,
    state: SessionState,
    response_deadline: Option<Duration>,
    shutdown_requested: bool,
}

impl Session {
    /// Session over a caller-provided transport, so higher layers (and tests)
    /// can supply their own byte streams.
    pub fn new(transport: Box<dyn LspTransport>) -> Self {
        Session {
            transport,
            child: None,
            pending: HashSet::new(),
            state: SessionState::Open,
            response_deadline: None,
            shutdown_requested: false,
        }
    }

    /// Spawn `exe` and open a session over its stdio pipes.
    pub fn open(exe: &str, args: &[String]) -> Result<Self, LspError> {
        let (child, transport) = stdio_transport::spawn_server(exe, args)?;
        let mut session = Session::new(Box::new(transport));
        session.child = Some(child);
        Ok(session)
    }

    /// Bound every `await_response_for` call by `deadline`, so a hung server
    /// cannot stall the harness forever.
    pub fn with_response_deadline(mut self, deadline: Duration) -> Self {
        self.response_deadline = Some(deadline);
        self
    }

    /// Frame and write one message, flushing through to the server. Requests
    /// are recorded as pending until their response is seen.
    pub async fn send(&mut self, message: &SendMessage) -> Result<(), LspError> {
        if self.state != SessionState::Open {
            return Err(LspError::SessionClosed);
        }

        self.transport.send(message).await?;

        if let Some(id) = message.id() {
            self.pending.insert(id.clone());
        }
        if message.method() == "shutdown" {
            self.shutdown_requested = true;
        }
        Ok(())
    }

    /// Block until one full frame has been decoded and classified. Frames
    /// are consumed in arrival order and never re-read. `None` means the
    /// server ended its output stream; the session is closed from then on.
    ///
    /// Framing errors also close the session: once byte alignment is lost
    /// there is nothing left to resynchronize against.
    pub async fn await_next(&mut self) -> Result<Option<Message>, LspError> {
        if self.state != SessionState::Open {
            return Err(LspError::SessionClosed);
        }

        let body = match self.transport.read().await {
            Ok(body) => body,
            Err(LspError::StreamClosed) => {
                self.terminate().await;
                return Ok(None);
            }
            Err(e) => {
                self.terminate().await;
                return Err(e);
            }
        };

        match protocol::parse_message(&body) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                self.terminate().await;
                Err(e)
            }
        }
    }

    /// Pull frames until the response matching `id` arrives, then return it
    /// and clear the id from the pending registry. Notifications,
    /// server-initiated requests, and unrelated responses are discarded.
    pub async fn await_response_for(&mut self, id: &RequestId) -> Result<ResponseMessage, LspError> {
        match self.response_deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.scan_for_response(id)).await {
                    Ok(result) => result,
                    Err(_) => Err(LspError::Timeout {
                        id: id.clone(),
                        timeout: deadline,
                    }),
                }
            }
            None => self.scan_for_response(id).await,
        }
    }

    async fn scan_for_response(&mut self, id: &RequestId) -> Result<ResponseMessage, LspError> {
        loop {
            let message = match self.await_next().await? {
                Some(message) => message,
                None => return Err(LspError::ResponseNeverArrived { id: id.clone() }),
            };

            match message {
                Message::Response(response) => {
                    // an unrelated response still answers its own request
                    self.pending.remove(&response.id);
                    if response.id == *id {
                        return Ok(response);
                    }
                    log::debug!("discarding response for unrelated request {}", response.id);
                }
                Message::Notification(notification) => {
                    log::debug!(
                        "discarding notification {} while waiting for {}",
                        notification.method,
                        id
                    );
                }
                Message::Request(request) => {
                    log::debug!(
                        "discarding server request {} while waiting for {}",
                        request.method,
                        id
                    );
                }
            }
        }
    }

    /// Tear the session down: courtesy `shutdown` (unless the caller already
    /// sent one) and `exit` to the server, then terminate the child and
    /// release the pipes.
    pub async fn close(&mut self) -> Result<(), LspError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closing;

        if !self.shutdown_requested {
            let shutdown = SendMessage::Request(Request::new(
                RequestId::Number(0),
                "shutdown".to_string(),
                None,
            ));
            if let Err(e) = self.transport.send(&shutdown).await {
                log::warn!("shutdown request not delivered: {}", e);
            }
        }

        let exit = SendMessage::Notification(Notification::new("exit".to_string(), None));
        if let Err(e) = self.transport.send(&exit).await {
            log::warn!("exit notification not delivered: {}", e);
        }

        self.state = SessionState::Closed;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        Ok(())
    }

    async fn terminate(&mut self) {
        self.state = SessionState::Closed;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // kill_on_drop on the spawned command is the backstop; this covers
        // sessions dropped without close() on early error paths
        if let Some(child) = &mut self.child {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::framing;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    struct DuplexTransport {
        stream: DuplexStream,
    }

    #[async_trait]
    impl LspTransport for DuplexTransport {
        async fn send(&mut self, message: &SendMessage) -> Result<(), LspError> {
            framing::write_frame(&mut self.stream, message).await
        }

        async fn read(&mut self) -> Result<String, LspError> {
            framing::read_frame(&mut self.stream).await
        }
    }

    fn session_over_duplex() -> (Session, DuplexStream) {
        let (client, server) = duplex(4096);
        let session = Session::new(Box::new(DuplexTransport { stream: client }));
        (session, server)
    }

    fn request(id: i64, method: &str, params: serde_json::Value) -> SendMessage {
        SendMessage::Request(Request::new(id.into(), method.to_string(), Some(params)))
    }

    async fn write_raw(server: &mut DuplexStream, body: &str) {
        let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        server.write_all(frame.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn correlates_response_through_interleaved_noise() {
        let (mut session, mut server) = session_over_duplex();

        let server_task = tokio::spawn(async move {
            // consume the request, then answer it behind two distractions
            let incoming = framing::read_frame(&mut server).await.unwrap();
            assert!(incoming.contains("\"initialize\""));

            write_raw(
                &mut server,
                r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"indexing"}}"#,
            )
            .await;
            write_raw(&mut server, r#"{"jsonrpc":"2.0","id":99,"result":{}}"#).await;
            write_raw(
                &mut server,
                r#"{"jsonrpc":"2.0","id":1,"result":{"capabilities":{}}}"#,
            )
            .await;
            server
        });

        session
            .send(&request(1, "initialize", json!({"capabilities": {}})))
            .await
            .unwrap();

        let response = session
            .await_response_for(&RequestId::Number(1))
            .await
            .expect("response never correlated");
        assert_eq!(response.id, RequestId::Number(1));
        assert!(response.result.is_some());
        assert!(session.pending.is_empty());

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn runs_a_full_definition_scenario() {
        let (mut session, mut server) = session_over_duplex();

        let server_task = tokio::spawn(async move {
            let init = framing::read_frame(&mut server).await.unwrap();
            assert!(init.contains("\"initialize\""));
            write_raw(
                &mut server,
                r#"{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"definitionProvider":true}}}"#,
            )
            .await;

            let did_open = framing::read_frame(&mut server).await.unwrap();
            assert!(did_open.contains("textDocument/didOpen"));

            let definition = framing::read_frame(&mut server).await.unwrap();
            assert!(definition.contains("textDocument/definition"));
            write_raw(
                &mut server,
                r#"{"jsonrpc":"2.0","id":2,"result":{"uri":"file:///tmp/def_jump.lua","range":{"start":{"line":0,"character":6},"end":{"line":0,"character":7}}}}"#,
            )
            .await;

            let shutdown = framing::read_frame(&mut server).await.unwrap();
            assert!(shutdown.contains("\"shutdown\""));
            write_raw(&mut server, r#"{"jsonrpc":"2.0","id":3,"result":null}"#).await;
            server
        });

        session
            .send(&request(1, "initialize", json!({"capabilities": {}})))
            .await
            .unwrap();
        let init = session
            .await_response_for(&RequestId::Number(1))
            .await
            .unwrap();
        assert_eq!(init.id, RequestId::Number(1));

        session
            .send(&SendMessage::Notification(Notification::new(
                "textDocument/didOpen".to_string(),
                Some(json!({"textDocument": {"uri": "file:///tmp/def_jump.lua"}})),
            )))
            .await
            .unwrap();

        session
            .send(&request(
                2,
                "textDocument/definition",
                json!({"position": {"line": 2, "character": 6}}),
            ))
            .await
            .unwrap();
        let definition = session
            .await_response_for(&RequestId::Number(2))
            .await
            .unwrap();
        let result = definition.result.unwrap();
        assert_eq!(result["range"]["start"]["line"], 0);

        session
            .send(&request(3, "shutdown", json!(null)))
            .await
            .unwrap();
        let shutdown = session
            .await_response_for(&RequestId::Number(3))
            .await
            .unwrap();
        assert_eq!(shutdown.id, RequestId::Number(3));
        assert!(shutdown.error.is_none());

        session.close().await.unwrap();
        let err = session
            .send(&request(4, "textDocument/hover", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, LspError::SessionClosed));

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn await_next_returns_none_when_server_exits() {
        let (mut session, server) = session_over_duplex();
        drop(server);

        let next = session.await_next().await.unwrap();
        assert!(next.is_none());

        // the session is closed once the stream has ended
        let err = session.await_next().await.unwrap_err();
        assert!(matches!(err, LspError::SessionClosed));
    }

    #[tokio::test]
    async fn reports_response_never_arrived_on_early_exit() {
        let (mut session, mut server) = session_over_duplex();

        session
            .send(&request(1, "initialize", json!({})))
            .await
            .unwrap();
        write_raw(
            &mut server,
            r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":1,"message":"dying"}}"#,
        )
        .await;
        drop(server);

        let err = session
            .await_response_for(&RequestId::Number(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LspError::ResponseNeverArrived {
                id: RequestId::Number(1)
            }
        ));
    }

    #[tokio::test]
    async fn framing_violation_closes_the_session() {
        let (mut session, mut server) = session_over_duplex();

        server
            .write_all(b"Content-Length: nonsense\r\n\r\n")
            .await
            .unwrap();

        let err = session.await_next().await.unwrap_err();
        assert!(matches!(err, LspError::MalformedHeader(_)));

        let err = session.send(&request(1, "initialize", json!({}))).await;
        assert!(matches!(err, Err(LspError::SessionClosed)));
    }

    #[tokio::test]
    async fn unrelated_response_clears_its_own_pending_entry() {
        let (mut session, mut server) = session_over_duplex();

        session.send(&request(1, "initialize", json!({}))).await.unwrap();
        session
            .send(&request(2, "textDocument/definition", json!({})))
            .await
            .unwrap();
        assert_eq!(session.pending.len(), 2);

        // answered out of order: id 2 first
        write_raw(&mut server, r#"{"jsonrpc":"2.0","id":2,"result":[]}"#).await;
        write_raw(&mut server, r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).await;

        let response = session
            .await_response_for(&RequestId::Number(1))
            .await
            .unwrap();
        assert_eq!(response.id, RequestId::Number(1));
        assert!(session.pending.is_empty());
    }

    #[tokio::test]
    async fn response_deadline_surfaces_as_timeout() {
        let (session, _server) = session_over_duplex();
        let mut session = session.with_response_deadline(Duration::from_millis(50));

        session.send(&request(1, "initialize", json!({}))).await.unwrap();

        // _server stays alive, so the stream never closes; the wait must be
        // cut by the deadline instead
        let err = session
            .await_response_for(&RequestId::Number(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LspError::Timeout { .. }));
    }

    #[tokio::test]
    async fn close_sends_courtesy_shutdown_and_exit_when_caller_did_not() {
        let (mut session, mut server) = session_over_duplex();

        session.close().await.unwrap();

        let shutdown = framing::read_frame(&mut server).await.unwrap();
        assert!(shutdown.contains("\"shutdown\""));
        let exit = framing::read_frame(&mut server).await.unwrap();
        assert!(exit.contains("\"exit\""));
    }

    #[tokio::test]
    async fn close_skips_shutdown_when_caller_already_sent_it() {
        let (mut session, mut server) = session_over_duplex();

        session.send(&request(3, "shutdown", json!(null))).await.unwrap();
        session.close().await.unwrap();

        let first = framing::read_frame(&mut server).await.unwrap();
        assert!(first.contains("\"shutdown\""));
        let second = framing::read_frame(&mut server).await.unwrap();
        assert!(second.contains("\"exit\""));
    }
}
