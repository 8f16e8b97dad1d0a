//! Envelope construction and line framing.
//!
//! Every message travels as one line of compact JSON terminated by `\n`.
//! `decode` classifies a line by its members: `method` + `id` is a request,
//! `method` alone a notification, `id` with exactly one of `result`/`error`
//! a response.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::McpError;
use crate::types::*;

/// Any JSON-RPC envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

/// Outcome of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(JsonRpcMessage),
    /// An empty line: the peer has nothing more to say.
    EndOfStream,
}

/// Build a request, generating a UUID id when none is given.
pub fn build_request(
    method: &str,
    params: Option<Value>,
    id: Option<RpcId>,
) -> Result<JsonRpcRequest, McpError> {
    if method.is_empty() {
        return Err(McpError::InvalidRequest("method must not be empty".to_string()));
    }
    let id = id.unwrap_or_else(|| RpcId::String(uuid::Uuid::new_v4().to_string()));
    Ok(JsonRpcRequest::new(id, method, params))
}

/// Build a notification; receivers never answer it.
pub fn build_notification(
    method: &str,
    params: Option<Value>,
) -> Result<JsonRpcNotification, McpError> {
    if method.is_empty() {
        return Err(McpError::InvalidRequest("method must not be empty".to_string()));
    }
    Ok(JsonRpcNotification::new(method, params))
}

/// Serialize a message as a single newline-terminated line.
pub fn encode(message: &JsonRpcMessage) -> Result<String, McpError> {
    match message {
        JsonRpcMessage::Request(req) => to_line(req),
        JsonRpcMessage::Notification(notif) => to_line(notif),
        JsonRpcMessage::Response(resp) => {
            if resp.result.is_some() == resp.error.is_some() {
                return Err(McpError::Encoding(format!(
                    "response {} must carry exactly one of result or error",
                    resp.id
                )));
            }
            to_line(resp)
        }
    }
}

fn to_line<T: Serialize>(value: &T) -> Result<String, McpError> {
    let mut line = serde_json::to_string(value).map_err(|e| McpError::Encoding(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Parse one line (with or without its trailing newline).
pub fn decode(line: &str) -> Result<Decoded, McpError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Decoded::EndOfStream);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| McpError::Decoding(format!("malformed JSON: {e}")))?;
    let Value::Object(mut obj) = value else {
        return Err(McpError::Decoding("envelope is not a JSON object".to_string()));
    };

    match obj.remove("jsonrpc") {
        Some(Value::String(tag)) if tag == JSONRPC_VERSION => {}
        Some(other) => {
            return Err(McpError::Decoding(format!("unsupported jsonrpc version {other}")));
        }
        None => return Err(McpError::Decoding("missing jsonrpc member".to_string())),
    }

    let id = obj.remove("id").map(parse_id).transpose()?;

    if let Some(method) = obj.remove("method") {
        let method = match method {
            Value::String(m) if !m.is_empty() => m,
            _ => return Err(McpError::Decoding("method must be a non-empty string".to_string())),
        };
        let params = take_params(&mut obj)?;
        let message = match id {
            Some(id) => JsonRpcMessage::Request(JsonRpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                method,
                params,
            }),
            None => JsonRpcMessage::Notification(JsonRpcNotification {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method,
                params,
            }),
        };
        return Ok(Decoded::Message(message));
    }

    let id = id.ok_or_else(|| McpError::Decoding("envelope has neither method nor id".to_string()))?;
    let result = obj.remove("result");
    let error = obj
        .remove("error")
        .map(|e| {
            serde_json::from_value::<JsonRpcError>(e)
                .map_err(|e| McpError::Decoding(format!("malformed error object: {e}")))
        })
        .transpose()?;

    if result.is_some() == error.is_some() {
        return Err(McpError::Decoding(format!(
            "response {id} must carry exactly one of result or error"
        )));
    }

    Ok(Decoded::Message(JsonRpcMessage::Response(JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result,
        error,
    })))
}

fn parse_id(value: Value) -> Result<RpcId, McpError> {
    serde_json::from_value(value).map_err(|e| McpError::Decoding(format!("invalid id: {e}")))
}

fn take_params(obj: &mut Map<String, Value>) -> Result<Value, McpError> {
    match obj.remove("params") {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(params @ (Value::Object(_) | Value::Array(_))) => Ok(params),
        Some(other) => Err(McpError::Decoding(format!(
            "params must be an object or array, got {other}"
        ))),
    }
}
