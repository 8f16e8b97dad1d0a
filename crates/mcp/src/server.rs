//! MCP server implementation.
//!
//! Wraps a `ToolRegistry` and exposes its tools over the MCP protocol.
//! Handles JSON-RPC requests and dispatches them to the appropriate handlers.

use serde_json::Value;

use sqlpipe_tool_runtime::tool::ToolContext;
use sqlpipe_tool_runtime::ToolRegistry;

use crate::codec::{decode, encode, Decoded, JsonRpcMessage};
use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// MCP server that bridges a `ToolRegistry` to MCP clients.
pub struct McpServer {
    registry: ToolRegistry,
    server_name: String,
    server_version: String,
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server wrapping the given tool registry.
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_name: "sqlpipe-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: false,
        }
    }

    /// Set the server name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set the version reported in `serverInfo`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the server loop, reading from and writing to the transport.
    ///
    /// Processes JSON-RPC requests until the transport is closed.
    pub async fn run<T: McpTransport>(&mut self, transport: &mut T) -> Result<(), McpError> {
        tracing::info!(
            server = %self.server_name,
            tools = self.registry.len(),
            "MCP server starting"
        );

        while let Some(line) = transport.receive().await? {
            tracing::debug!(message = %line, "Received message");

            let message = match decode(&line) {
                Ok(Decoded::Message(message)) => message,
                Ok(Decoded::EndOfStream) => continue,
                Err(e) => {
                    // The id is unknowable for a line we could not parse.
                    tracing::warn!(error = %e, "Rejecting malformed message");
                    let resp = JsonRpcResponse::from_rpc_error(RpcId::Null, e.to_rpc_error());
                    self.reply(transport, resp).await?;
                    continue;
                }
            };

            match message {
                JsonRpcMessage::Request(request) => {
                    let response = self.handle_request(&request).await;
                    self.reply(transport, response).await?;
                }
                JsonRpcMessage::Notification(notif) => self.handle_notification(&notif),
                JsonRpcMessage::Response(resp) => {
                    tracing::debug!(id = %resp.id, "Ignoring unsolicited response");
                }
            }
        }

        tracing::info!("Transport closed, shutting down");
        Ok(())
    }

    async fn reply<T: McpTransport>(
        &self,
        transport: &mut T,
        response: JsonRpcResponse,
    ) -> Result<(), McpError> {
        let frame = encode(&JsonRpcMessage::Response(response))?;
        tracing::debug!(response = %frame.trim_end(), "Sending response");
        transport.send(&frame).await
    }

    /// Handle a single JSON-RPC request and produce a response.
    pub async fn handle_request(&mut self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let method = Method::parse(&request.method);

        let outcome = match &method {
            Method::Initialize => self.handle_initialize(&request.params),
            Method::Ping => Ok(Value::Object(Default::default())),
            Method::ToolsList => self.handle_list_tools(),
            Method::ToolsCall => self.handle_call_tool(&id, &request.params).await,
            Method::Initialized | Method::Cancelled | Method::Unknown(_) => {
                tracing::warn!(method = %method, "Unknown method");
                Err(McpError::MethodNotFound(method.to_string()))
            }
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::from_rpc_error(id, e.to_rpc_error()),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match Method::parse(&notif.method) {
            Method::Initialized => {
                tracing::info!("Client confirmed initialization");
            }
            Method::Cancelled => {
                tracing::debug!("Client cancelled a request");
            }
            method => {
                tracing::debug!(method = %method, "Unknown notification, ignoring");
            }
        }
    }

    fn handle_initialize(&mut self, params: &Value) -> Result<Value, McpError> {
        let params: InitializeParams = serde_json::from_value(params.clone())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        tracing::info!(
            client = %params.client_info.name,
            protocol = %params.protocol_version,
            "Handling initialize"
        );
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: Some(self.server_version.clone()),
            },
        };
        to_result(result)
    }

    fn handle_list_tools(&self) -> Result<Value, McpError> {
        if !self.initialized {
            return Err(McpError::NotInitialized);
        }
        tracing::debug!("Handling tools/list");

        let tools: Vec<ToolInfo> = self.registry.list().into_iter().map(ToolInfo::from).collect();
        to_result(ListToolsResult { tools })
    }

    async fn handle_call_tool(&self, id: &RpcId, params: &Value) -> Result<Value, McpError> {
        if !self.initialized {
            return Err(McpError::NotInitialized);
        }
        let mut call: CallToolParams = serde_json::from_value(params.clone())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        if call.arguments.is_null() {
            call.arguments = empty_params();
        }

        tracing::debug!(tool = %call.name, "Handling tools/call");

        let ctx = ToolContext::new(id.to_string());
        let result = self.registry.invoke(&call.name, call.arguments, &ctx).await?;
        to_result(CallToolResult::from(result))
    }
}

fn to_result<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::Encoding(e.to_string()))
}
