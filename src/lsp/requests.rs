//! Typed payload builders for the scenario traffic, with sequential id
//! allocation.

use lsp_types::{
    ClientCapabilities, DidOpenTextDocumentParams, GotoDefinitionParams, InitializeParams,
    InitializedParams, PartialResultParams, Position, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Url, WorkDoneProgressParams, WorkspaceFolder,
};
use serde::Serialize;

use crate::lsp::error::LspError;
use crate::lsp::types::{Notification, Request, RequestId};

/// Hands out sequential request ids and stamps outgoing messages with them.
pub struct MessageFactory {
    next_id: i64,
}

impl MessageFactory {
    pub fn new() -> Self {
        MessageFactory { next_id: 0 }
    }

    fn next_id(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId::Number(self.next_id)
    }

    pub fn request<T: Serialize>(
        &mut self,
        method: &str,
        params: Option<T>,
    ) -> Result<Request, LspError> {
        let params = params
            .map(|p| serde_json::to_value(p).map_err(LspError::Encoding))
            .transpose()?;
        Ok(Request::new(self.next_id(), method.to_string(), params))
    }

    pub fn notification<T: Serialize>(
        &mut self,
        method: &str,
        params: Option<T>,
    ) -> Result<Notification, LspError> {
        let params = params
            .map(|p| serde_json::to_value(p).map_err(LspError::Encoding))
            .transpose()?;
        Ok(Notification::new(method.to_string(), params))
    }

    pub fn initialize(&mut self, root: &Url) -> Result<Request, LspError> {
        self.request("initialize", Some(initialize_params(root)))
    }

    pub fn initialized(&mut self) -> Result<Notification, LspError> {
        self.notification("initialized", Some(InitializedParams {}))
    }

    pub fn did_open(
        &mut self,
        uri: &Url,
        language_id: &str,
        text: &str,
    ) -> Result<Notification, LspError> {
        self.notification(
            "textDocument/didOpen",
            Some(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: language_id.to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            }),
        )
    }

    pub fn definition(&mut self, uri: &Url, position: Position) -> Result<Request, LspError> {
        self.request(
            "textDocument/definition",
            Some(GotoDefinitionParams {
                text_document_position_params: TextDocumentPositionParams {
                    text_document: TextDocumentIdentifier { uri: uri.clone() },
                    position,
                },
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            }),
        )
    }

    pub fn shutdown(&mut self) -> Result<Request, LspError> {
        self.request::<serde_json::Value>("shutdown", None)
    }
}

#[allow(deprecated)] // rootUri is still sent alongside workspaceFolders
fn initialize_params(root: &Url) -> InitializeParams {
    InitializeParams {
        process_id: Some(std::process::id()),
        root_uri: Some(root.clone()),
        workspace_folders: Some(vec![WorkspaceFolder {
            uri: root.clone(),
            name: root
                .path_segments()
                .and_then(|segments| segments.last())
                .filter(|name| !name.is_empty())
                .unwrap_or("workspace")
                .to_string(),
        }]),
        capabilities: ClientCapabilities::default(),
        ..Default::default()
    }
}
