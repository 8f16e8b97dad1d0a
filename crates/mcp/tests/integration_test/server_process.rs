use serde_json::json;

use sqlpipe_mcp::{McpClient, McpError, SessionState, PROTOCOL_VERSION};
use sqlpipe_tool_runtime::tools::read_only_query::ONLY_SELECT;

use crate::helpers::{server_command, within_timeout};

#[tokio::test]
async fn test_handshake_and_tool_discovery() {
    within_timeout(async {
        let mut client = McpClient::spawn(&server_command()[..]).await.unwrap();
        assert_eq!(client.state(), SessionState::Ready);
        assert_eq!(client.server_info().unwrap().name, "mysql_mcp_server");
        assert_eq!(client.protocol_version(), Some(PROTOCOL_VERSION));

        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["list_tables", "describe_table", "read_only_query"]);
        assert!(tools.iter().all(|t| !t.description.is_empty()));

        client.terminate().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
    })
    .await;
}

#[tokio::test]
async fn test_rejected_query_never_reaches_database() {
    within_timeout(async {
        let mut client = McpClient::spawn(&server_command()[..]).await.unwrap();

        let result = client
            .call_tool("read_only_query", json!({"query": "DELETE FROM users"}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.text(), ONLY_SELECT);

        let missing = client.call_tool("describe_table", json!({})).await.unwrap();
        assert!(missing.is_error);
        assert!(missing.text().contains("table_name"));

        client.terminate().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_unknown_tool_leaves_session_usable() {
    within_timeout(async {
        let mut client = McpClient::spawn(&server_command()[..]).await.unwrap();

        let err = client.call_tool("drop_everything", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(ref name) if name == "drop_everything"));
        assert_eq!(client.state(), SessionState::Ready);

        client.ping().await.unwrap();
        assert_eq!(client.list_tools().await.unwrap().len(), 3);

        client.terminate().await.unwrap();
        client.terminate().await.unwrap();
        assert!(matches!(client.ping().await, Err(McpError::SessionClosed)));
    })
    .await;
}
