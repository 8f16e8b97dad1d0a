use std::process::Output;

use sqlpipe_tool_runtime::tools::read_only_query::ONLY_SELECT;
use sqlpipe_tool_runtime::tools::CONNECT_FAILED;

use crate::helpers::{server_command, within_timeout};

/// Run `sqlpipe-client` against the bundled server and collect its output.
async fn run_client(args: &[&str]) -> Output {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_sqlpipe-client"));
    command
        .args(args)
        .arg("--")
        .args(server_command())
        .env("RUST_LOG", "warn")
        .kill_on_drop(true);
    within_timeout(command.output())
        .await
        .expect("failed to run sqlpipe-client")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test]
async fn test_default_call_uses_first_listed_tool() {
    let output = run_client(&[]).await;
    let stdout = stdout_of(&output);

    assert!(output.status.success(), "client failed: {output:?}");
    assert!(stdout.contains("initialize:"));
    assert!(stdout.contains("\"mysql_mcp_server\""));
    assert!(stdout.contains("tools/list:"));
    assert!(stdout.contains("tools/call list_tables:"));
    assert!(stdout.contains(CONNECT_FAILED));
    assert!(stdout.contains("\"isError\": true"));
}

#[tokio::test]
async fn test_named_tool_with_arguments() {
    let output = run_client(&[
        "--tool",
        "read_only_query",
        "--arguments",
        r#"{"query":"DELETE FROM t"}"#,
    ])
    .await;
    let stdout = stdout_of(&output);

    assert!(output.status.success(), "client failed: {output:?}");
    assert!(stdout.contains("tools/call read_only_query:"));
    assert!(stdout.contains(ONLY_SELECT));
}

#[tokio::test]
async fn test_unknown_tool_prints_error_object() {
    let output = run_client(&["--tool", "ghost"]).await;
    let stdout = stdout_of(&output);

    assert!(output.status.success(), "client failed: {output:?}");
    assert!(stdout.contains("tools/call ghost:"));
    assert!(stdout.contains("\"code\": -32602"));
    assert!(stdout.contains("Tool not found: ghost"));
}

#[tokio::test]
async fn test_invalid_arguments_fail_before_spawning() {
    let output = run_client(&["--tool", "list_tables", "--arguments", "{not json"]).await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--arguments is not valid JSON"));
}
