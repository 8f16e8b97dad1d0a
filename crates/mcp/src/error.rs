//! Error types for the MCP crate.

use sqlpipe_tool_runtime::RegistryError;

use crate::types::{error_codes, JsonRpcError, RpcId};

/// Errors that can occur during MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The server process could not be started.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A message could not be serialized.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A received line is not a well-formed JSON-RPC envelope.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The initialize exchange failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The session was terminated or the peer closed its output.
    #[error("Session closed")]
    SessionClosed,

    /// A response arrived for a request other than the outstanding one.
    #[error("Unexpected response: expected id {expected}, got {actual}")]
    UnexpectedResponse { expected: RpcId, actual: RpcId },

    /// The envelope is valid JSON-RPC but not acceptable here.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested method is not supported.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters for a method.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A tool name was registered twice.
    #[error("Tool with name '{0}' is already registered")]
    DuplicateTool(String),

    /// Server/client not initialized.
    #[error("Not initialized: call initialize first")]
    NotInitialized,

    /// The server answered with a JSON-RPC error.
    #[error("Server error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl McpError {
    /// Convert to a JSON-RPC error object. An error the server sent comes
    /// back as it arrived.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        if let McpError::Rpc { code, message } = self {
            return JsonRpcError {
                code: *code,
                message: message.clone(),
                data: None,
            };
        }
        let code = match self {
            McpError::Decoding(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) | McpError::NotInitialized => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::ToolNotFound(_) => error_codes::INVALID_PARAMS,
            _ => error_codes::INTERNAL_ERROR,
        };
        JsonRpcError {
            code,
            message: self.to_string(),
            data: None,
        }
    }

    /// Whether the session can no longer be used after this error.
    ///
    /// JSON-RPC error responses and local misuse leave the session intact;
    /// transport and framing failures do not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::Spawn { .. }
                | McpError::Encoding(_)
                | McpError::Decoding(_)
                | McpError::Transport(_)
                | McpError::Handshake(_)
                | McpError::SessionClosed
                | McpError::UnexpectedResponse { .. }
        )
    }
}

impl From<RegistryError> for McpError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateName(name) => McpError::DuplicateTool(name),
            RegistryError::NotFound(name) => McpError::ToolNotFound(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            McpError::MethodNotFound("x".into()).to_rpc_error().code,
            error_codes::METHOD_NOT_FOUND
        );
        assert_eq!(
            McpError::ToolNotFound("x".into()).to_rpc_error().code,
            error_codes::INVALID_PARAMS
        );
        assert_eq!(McpError::NotInitialized.to_rpc_error().code, error_codes::INVALID_REQUEST);
        assert_eq!(
            McpError::Decoding("bad".into()).to_rpc_error().code,
            error_codes::PARSE_ERROR
        );
        assert_eq!(McpError::SessionClosed.to_rpc_error().code, error_codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_tool_not_found_message() {
        let rpc = McpError::ToolNotFound("ghost".into()).to_rpc_error();
        assert_eq!(rpc.message, "Tool not found: ghost");
    }

    #[test]
    fn test_server_error_passes_through() {
        let rpc = McpError::Rpc {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found: resources/list".into(),
        }
        .to_rpc_error();
        assert_eq!(rpc.code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(rpc.message, "Method not found: resources/list");
    }

    #[test]
    fn test_registry_errors_convert() {
        let err: McpError = RegistryError::NotFound("a".into()).into();
        assert!(matches!(err, McpError::ToolNotFound(ref n) if n == "a"));
        let err: McpError = RegistryError::DuplicateName("b".into()).into();
        assert!(matches!(err, McpError::DuplicateTool(ref n) if n == "b"));
    }

    #[test]
    fn test_fatality() {
        assert!(McpError::SessionClosed.is_fatal());
        assert!(McpError::Decoding("x".into()).is_fatal());
        assert!(!McpError::Rpc { code: -1, message: "x".into() }.is_fatal());
        assert!(!McpError::NotInitialized.is_fatal());
    }
}
