use crate::lsp::error::LspError;
use crate::lsp::types::{Message, Notification, Request, ResponseMessage};

/// Classify a decoded JSON value into one of the three JSON-RPC shapes.
///
/// Presence of `id` and `method` decides the shape. A body matching none of
/// the three, or a response carrying both or neither of `result`/`error`, is
/// rejected.
pub fn classify(json: serde_json::Value) -> Result<Message, LspError> {
    let has_id = json.get("id").is_some_and(|v| !v.is_null());
    let has_method = json.get("method").is_some();

    match (has_id, has_method) {
        (true, true) => {
            let request: Request =
                serde_json::from_value(json).map_err(|e| LspError::MalformedBody(e.to_string()))?;
            Ok(Message::Request(request))
        }
        (false, true) => {
            let notification: Notification =
                serde_json::from_value(json).map_err(|e| LspError::MalformedBody(e.to_string()))?;
            Ok(Message::Notification(notification))
        }
        (true, false) => {
            // key presence, not value: a null `result` is still a result
            let has_result = json.get("result").is_some();
            let has_error = json.get("error").is_some();
            match (has_result, has_error) {
                (true, true) => Err(LspError::MalformedBody(
                    "response carries both result and error".to_string(),
                )),
                (false, false) => Err(LspError::MalformedBody(
                    "response carries neither result nor error".to_string(),
                )),
                _ => {
                    let response: ResponseMessage = serde_json::from_value(json)
                        .map_err(|e| LspError::MalformedBody(e.to_string()))?;
                    Ok(Message::Response(response))
                }
            }
        }
        (false, false) => Err(LspError::MalformedBody(
            "message has neither id nor method".to_string(),
        )),
    }
}

/// Parse a full JSON payload into a `Message`.
pub fn parse_message(body: &str) -> Result<Message, LspError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| LspError::MalformedBody(e.to_string()))?;
    classify(json)
}
