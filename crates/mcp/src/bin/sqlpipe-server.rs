//! sqlpipe-server: MCP server exposing a MySQL database over stdio.
//!
//! Tools:
//! - `list_tables`: tables in the configured database
//! - `describe_table`: column layout of one table
//! - `read_only_query`: a single SELECT statement
//!
//! Stdout carries the protocol, so all logging goes to stderr.

use std::sync::Arc;

use tracing::info;

use sqlpipe_core::{load_dotenv, DatabaseConfig};
use sqlpipe_mcp::{McpServer, StdioTransport};
use sqlpipe_tool_runtime::{register_database_tools, MySqlDatabase, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = DatabaseConfig::from_env();
    config.log_summary();

    let db = Arc::new(MySqlDatabase::connect_lazy(&config));
    let mut registry = ToolRegistry::new();
    register_database_tools(&mut registry, db)?;

    let mut server = McpServer::new(registry).with_name("mysql_mcp_server");
    info!(tools = server.registry().len(), "registered database tools");
    let mut transport = StdioTransport::new();
    server.run(&mut transport).await?;

    info!("sqlpipe-server exiting");
    Ok(())
}
