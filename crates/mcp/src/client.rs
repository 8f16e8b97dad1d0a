//! MCP client session.
//!
//! Drives a server through the handshake and then strictly sequential
//! request/response exchanges:
//!
//! ```text
//! Unstarted → Initializing → Ready ⇄ Exchanging
//!                               ↘        ↘
//!                                 Closed
//! ```
//!
//! Only one request is ever outstanding, so responses are correlated by
//! comparing against that single id rather than through a pending table.

use serde_json::Value;

use crate::codec::{build_notification, build_request, decode, encode, Decoded, JsonRpcMessage};
use crate::error::McpError;
use crate::transport::{McpTransport, ProcessTransport};
use crate::types::*;

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Initializing,
    Ready,
    Exchanging,
    Closed,
}

/// What the client announces in `initialize`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_name: String,
    pub client_version: String,
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "sqlpipe-client".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// An MCP client session over a transport, by default a server subprocess.
pub struct McpClient<T: McpTransport = ProcessTransport> {
    transport: T,
    config: ClientConfig,
    state: SessionState,
    server: Option<InitializeResult>,
}

impl McpClient<ProcessTransport> {
    /// Spawn an MCP server process and complete the handshake with it.
    pub async fn spawn<S: AsRef<str>>(command: &[S]) -> Result<Self, McpError> {
        Self::spawn_with(command, ClientConfig::default()).await
    }

    pub async fn spawn_with<S: AsRef<str>>(
        command: &[S],
        config: ClientConfig,
    ) -> Result<Self, McpError> {
        let transport = ProcessTransport::spawn(command)?;
        Self::connect(transport, config).await
    }
}

impl<T: McpTransport> McpClient<T> {
    /// Wrap a transport without talking to it yet.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Unstarted,
            server: None,
        }
    }

    /// Wrap a transport and complete the handshake.
    pub async fn connect(transport: T, config: ClientConfig) -> Result<Self, McpError> {
        let mut client = Self::new(transport, config);
        client.initialize().await?;
        Ok(client)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// What the server reported about itself in the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref().map(|s| &s.server_info)
    }

    /// Protocol version the server answered with.
    pub fn protocol_version(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.protocol_version.as_str())
    }

    pub fn initialize_result(&self) -> Option<&InitializeResult> {
        self.server.as_ref()
    }

    /// Perform the MCP handshake: `initialize`, then exactly one
    /// `notifications/initialized` once the response is in.
    pub async fn initialize(&mut self) -> Result<&InitializeResult, McpError> {
        match self.state {
            SessionState::Unstarted => {}
            SessionState::Closed => return Err(McpError::SessionClosed),
            _ => return Err(McpError::Handshake("session already initialized".to_string())),
        }
        self.state = SessionState::Initializing;

        let params = serde_json::to_value(InitializeParams {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: self.config.client_name.clone(),
                version: Some(self.config.client_version.clone()),
            },
        })
        .map_err(|e| McpError::Encoding(e.to_string()))?;
        let request = build_request(Method::Initialize.as_str(), Some(params), None)?;

        tracing::debug!(id = %request.id, "Sending initialize");
        let response = match self.round_trip(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail_handshake(e.to_string()).await),
        };

        if let Some(err) = response.error {
            let reason = format!("server rejected initialize: {} ({})", err.message, err.code);
            return Err(self.fail_handshake(reason).await);
        }

        let result = response.result.unwrap_or(Value::Null);
        let result: InitializeResult = match serde_json::from_value(result) {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("malformed initialize result: {e}");
                return Err(self.fail_handshake(reason).await);
            }
        };

        let notification = build_notification(Method::Initialized.as_str(), None)?;
        if let Err(e) = self.send(&JsonRpcMessage::Notification(notification)).await {
            return Err(self.fail_handshake(e.to_string()).await);
        }

        tracing::info!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP client initialized"
        );
        self.state = SessionState::Ready;
        Ok(self.server.insert(result))
    }

    /// Send one request and wait for its result.
    ///
    /// A JSON-RPC error response comes back as `McpError::Rpc` and leaves the
    /// session ready; transport or framing failures close it.
    pub async fn request(&mut self, method: Method, params: Option<Value>) -> Result<Value, McpError> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Closed => return Err(McpError::SessionClosed),
            SessionState::Unstarted | SessionState::Initializing => {
                return Err(McpError::NotInitialized)
            }
            SessionState::Exchanging => {
                // An earlier exchange was abandoned mid-flight; its late
                // response would be mistaken for the next one.
                tracing::warn!("previous request never completed, closing session");
                self.shutdown().await;
                return Err(McpError::SessionClosed);
            }
        }
        if method == Method::Initialize || method.is_notification() {
            return Err(McpError::InvalidRequest(format!(
                "{method} cannot be sent as a request"
            )));
        }

        let request = build_request(method.as_str(), params, None)?;
        tracing::debug!(method = %method, id = %request.id, "Sending request");

        self.state = SessionState::Exchanging;
        let response = match self.round_trip(&request).await {
            Ok(response) => response,
            Err(e) if e.is_fatal() => {
                tracing::warn!(method = %method, error = %e, "exchange failed, closing session");
                self.shutdown().await;
                return Err(e);
            }
            Err(e) => {
                self.state = SessionState::Ready;
                return Err(e);
            }
        };
        self.state = SessionState::Ready;

        if let Some(err) = response.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    pub async fn ping(&mut self) -> Result<(), McpError> {
        self.request(Method::Ping, None).await.map(|_| ())
    }

    /// Discover the tools the server offers, in the server's order.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolInfo>, McpError> {
        let result = self.request(Method::ToolsList, None).await?;
        let result: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| McpError::Decoding(format!("malformed tools/list result: {e}")))?;
        tracing::debug!(count = result.tools.len(), "Tool discovery complete");
        Ok(result.tools)
    }

    /// Call a tool on the remote MCP server.
    ///
    /// Tool-level failures are a successful call whose result has `is_error`
    /// set. An unknown tool name is `McpError::ToolNotFound`.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let result = match self.request(Method::ToolsCall, Some(params)).await {
            Ok(result) => result,
            Err(McpError::Rpc { code, message })
                if code == error_codes::INVALID_PARAMS
                    && message == McpError::ToolNotFound(name.to_string()).to_string() =>
            {
                return Err(McpError::ToolNotFound(name.to_string()));
            }
            Err(e) => return Err(e),
        };

        serde_json::from_value(result)
            .map_err(|e| McpError::Decoding(format!("malformed tools/call result: {e}")))
    }

    /// Close the session and stop the server. Safe to call repeatedly.
    pub async fn terminate(&mut self) -> Result<(), McpError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        tracing::info!("Shutting down MCP session");
        self.state = SessionState::Closed;
        self.transport.close().await
    }

    async fn shutdown(&mut self) {
        self.state = SessionState::Closed;
        if let Err(e) = self.transport.close().await {
            tracing::warn!(error = %e, "failed to close transport");
        }
    }

    async fn fail_handshake(&mut self, reason: String) -> McpError {
        tracing::warn!(reason = %reason, "MCP handshake failed");
        self.shutdown().await;
        McpError::Handshake(reason)
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), McpError> {
        let frame = encode(message)?;
        self.transport.send(&frame).await
    }

    /// Send `request` and wait for the response carrying its id.
    ///
    /// Server notifications that arrive meanwhile are logged and skipped;
    /// server-initiated requests are refused with "method not found".
    async fn round_trip(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        self.send(&JsonRpcMessage::Request(request.clone())).await?;

        loop {
            let line = self.transport.receive().await?.ok_or(McpError::SessionClosed)?;
            let message = match decode(&line)? {
                Decoded::Message(message) => message,
                Decoded::EndOfStream => return Err(McpError::SessionClosed),
            };

            match message {
                JsonRpcMessage::Response(response) => {
                    // A null id answers a request the server could not parse.
                    let unattributed = response.id == RpcId::Null && response.error.is_some();
                    if response.id != request.id && !unattributed {
                        return Err(McpError::UnexpectedResponse {
                            expected: request.id.clone(),
                            actual: response.id,
                        });
                    }
                    return Ok(response);
                }
                JsonRpcMessage::Notification(notification) => {
                    tracing::debug!(method = %notification.method, "Server notification while awaiting response");
                }
                JsonRpcMessage::Request(incoming) => {
                    tracing::debug!(method = %incoming.method, "Refusing server-initiated request");
                    let refusal = JsonRpcResponse::from_rpc_error(
                        incoming.id,
                        McpError::MethodNotFound(incoming.method).to_rpc_error(),
                    );
                    self.send(&JsonRpcMessage::Response(refusal)).await?;
                }
            }
        }
    }
}
