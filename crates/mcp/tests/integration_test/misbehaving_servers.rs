use sqlpipe_mcp::{McpClient, McpError, SessionState};

use crate::helpers::{connect_script, within_timeout, ANSWER_INITIALIZE};

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let err = McpClient::spawn(&["sqlpipe-no-such-server-binary"]).await.err().unwrap();
    assert!(matches!(err, McpError::Spawn { .. }));
}

#[tokio::test]
async fn test_server_exiting_before_handshake() {
    within_timeout(async {
        let err = connect_script("exit 0").await.err().unwrap();
        assert!(matches!(err, McpError::Handshake(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_server_answering_wrong_id() {
    within_timeout(async {
        let script = r#"read line
printf '{"jsonrpc":"2.0","id":"not-yours","result":{}}\n'
exec sleep 30"#;
        let err = connect_script(script).await.err().unwrap();
        match err {
            McpError::Handshake(reason) => assert!(reason.contains("not-yours"), "{reason}"),
            other => panic!("expected handshake error, got {other:?}"),
        }
    })
    .await;
}

#[tokio::test]
async fn test_server_writing_garbage() {
    within_timeout(async {
        let script = "read line\necho 'hello, this is not json'\nexec sleep 30";
        let err = connect_script(script).await.err().unwrap();
        assert!(matches!(err, McpError::Handshake(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_server_exiting_mid_session() {
    within_timeout(async {
        let script = format!("{ANSWER_INITIALIZE}read notification\nread request\nexit 0\n");
        let mut client = connect_script(&script).await.unwrap();
        assert_eq!(client.server_info().unwrap().name, "stub");

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::SessionClosed), "got {err:?}");
        assert_eq!(client.state(), SessionState::Closed);
        client.terminate().await.unwrap();
    })
    .await;
}
