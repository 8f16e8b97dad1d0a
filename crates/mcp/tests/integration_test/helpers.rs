use std::future::Future;
use std::time::Duration;

use sqlpipe_mcp::{ClientConfig, McpClient, McpError, ProcessTransport};

/// Upper bound for any single scenario; a hang is a failure.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn within_timeout<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(SCENARIO_TIMEOUT, fut)
        .await
        .expect("scenario timed out")
}

/// Command line for the bundled server, pointed at a port nothing listens on.
pub fn server_command() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        "DB_HOST=127.0.0.1 DB_PORT=1 DB_NAME=sqlpipe_test RUST_LOG=warn exec \"$0\"".to_string(),
        env!("CARGO_BIN_EXE_sqlpipe-server").to_string(),
    ]
}

/// Spawn a `sh -c` script as the server and attempt the handshake.
pub async fn connect_script(script: &str) -> Result<McpClient, McpError> {
    let transport = ProcessTransport::spawn(&["sh", "-c", script])?
        .with_grace_period(Duration::from_millis(500));
    McpClient::connect(transport, ClientConfig::default()).await
}

/// Shell snippet that answers one `initialize` request with the id it was sent.
pub const ANSWER_INITIALIZE: &str = r#"read line
id=$(printf '%s' "$line" | sed 's/.*"id":"\([^"]*\)".*/\1/')
printf '{"jsonrpc":"2.0","id":"%s","result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"stub"}}}\n' "$id"
"#;
