//! MCP (Model Context Protocol) over line-delimited JSON-RPC 2.0.
//!
//! A client drives a server subprocess through its stdin/stdout; the server
//! side exposes a `ToolRegistry` to whoever is on the other end of the pipe.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **codec**: one JSON object per line, validated on the way in
//! - **transport**: Pluggable transport layer (subprocess, stdio, channels)
//! - **server**: MCP server wrapping a `ToolRegistry`
//! - **client**: session state machine over a transport
//! - **error**: Unified error types
//!
//! # Usage
//!
//! ## Server
//! ```no_run
//! use sqlpipe_mcp::server::McpServer;
//! use sqlpipe_mcp::transport::StdioTransport;
//! use sqlpipe_tool_runtime::ToolRegistry;
//!
//! # async fn example() {
//! let registry = ToolRegistry::new();
//! let mut server = McpServer::new(registry);
//! let mut transport = StdioTransport::new();
//! server.run(&mut transport).await.unwrap();
//! # }
//! ```
//!
//! ## Client
//! ```no_run
//! use sqlpipe_mcp::client::McpClient;
//!
//! # async fn example() {
//! let mut client = McpClient::spawn(&["sqlpipe-server"]).await.unwrap();
//! let tools = client.list_tools().await.unwrap();
//! let result = client.call_tool(&tools[0].name, serde_json::json!({})).await.unwrap();
//! println!("{}", result.text());
//! client.terminate().await.unwrap();
//! # }
//! ```

pub mod types;
pub mod codec;
pub mod transport;
pub mod server;
pub mod client;
pub mod error;

pub use types::*;
pub use codec::{build_notification, build_request, decode, encode, Decoded, JsonRpcMessage};
pub use transport::{ChannelTransport, McpTransport, ProcessTransport, StdioTransport};
pub use server::McpServer;
pub use client::{ClientConfig, McpClient, SessionState};
pub use error::McpError;
