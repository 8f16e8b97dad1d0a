//! sqlpipe-client: drive an MCP server subprocess from the command line.
//!
//! Spawns the server, completes the handshake, lists its tools, calls one
//! and prints every payload as pretty JSON on stdout.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::info;

use sqlpipe_mcp::{ClientConfig, McpClient, McpError, ProcessTransport};

// ── CLI ─────────────────────────────────────────────────────────────

/// One-shot MCP client for a stdio server.
#[derive(Parser, Debug)]
#[command(name = "sqlpipe-client", version, about)]
struct Cli {
    /// Tool to call. Defaults to the first tool the server lists.
    #[arg(long)]
    tool: Option<String>,

    /// Tool arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    arguments: String,

    /// Seconds to wait for the server to exit after SIGTERM.
    #[arg(long, env = "SQLPIPE_GRACE_SECS", default_value_t = 5)]
    grace_secs: u64,

    /// Server command line.
    #[arg(last = true, default_values = ["sqlpipe-server"])]
    command: Vec<String>,
}

fn print_json(label: &str, value: &Value) -> anyhow::Result<()> {
    println!("{label}:");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let arguments: Value =
        serde_json::from_str(&cli.arguments).context("--arguments is not valid JSON")?;

    let transport = ProcessTransport::spawn(cli.command.as_slice())?
        .with_grace_period(Duration::from_secs(cli.grace_secs));
    info!(command = ?cli.command, pid = ?transport.id(), "spawned server");

    let mut client = McpClient::connect(transport, ClientConfig::default()).await?;
    let outcome = exchange(&mut client, cli.tool.as_deref(), arguments).await;
    client.terminate().await?;
    outcome
}

async fn exchange(
    client: &mut McpClient,
    tool: Option<&str>,
    arguments: Value,
) -> anyhow::Result<()> {
    if let Some(init) = client.initialize_result() {
        print_json("initialize", &serde_json::to_value(init)?)?;
    }

    let tools = match client.list_tools().await {
        Ok(tools) => tools,
        Err(e) => return report_error("tools/list", e),
    };
    print_json("tools/list", &serde_json::to_value(&tools)?)?;

    let name = match tool.or_else(|| tools.first().map(|t| t.name.as_str())) {
        Some(name) => name.to_string(),
        None => {
            println!("server offers no tools");
            return Ok(());
        }
    };

    let label = format!("tools/call {name}");
    let result = match client.call_tool(&name, arguments).await {
        Ok(result) => result,
        Err(e) => return report_error(&label, e),
    };
    if result.is_error {
        tracing::warn!(tool = %name, "tool reported an error");
    }
    print_json(&label, &serde_json::to_value(&result)?)?;
    Ok(())
}

/// Print an error the session survives as its JSON-RPC error object.
/// Anything fatal ends the run.
fn report_error(label: &str, err: McpError) -> anyhow::Result<()> {
    if err.is_fatal() {
        return Err(err.into());
    }
    tracing::warn!(error = %err, "{label} failed");
    print_json(label, &serde_json::json!({ "error": err.to_rpc_error() }))
}
