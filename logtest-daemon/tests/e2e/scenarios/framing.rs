//! S2: Malformed and oversized input.
//!
//! Validates that bad requests degrade to diagnostic responses and that
//! the server keeps serving afterwards.

use logtest_core::protocol::ResponseCode;

use crate::helpers::client::{failed_login, send_json, send_raw};
use crate::helpers::config::TestConfigBuilder;
use crate::helpers::daemon::TestDaemon;

#[tokio::test]
async fn test_e2e_truncated_json_reports_offset() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    let response = send_raw(
        &daemon.socket,
        br#"{"event": "Jul 1 12:00:00 host sshd: x", "location": "/var"#.to_vec(),
    )
    .await;

    assert_eq!(response.code(), Some(ResponseCode::InputError));
    assert!(response.token.is_none());
    assert!(response.alert.is_none());
    assert_eq!(response.messages[0], "ERROR: Error parsing JSON");
    assert!(response.messages[1].contains("Error in position"));

    // The server keeps serving
    let next = send_json(&daemon.socket, &failed_login(None)).await;
    assert_eq!(next.code(), Some(ResponseCode::Success));

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_oversized_frame_is_rejected() {
    // Given: a server accepting frames up to 1 KiB
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path())
        .max_message_size(1024)
        .build();
    let daemon = TestDaemon::start(dir, config).await;

    // When: a 4 KiB frame is sent
    let response = send_raw(&daemon.socket, vec![b'x'; 4096]).await;

    // Then: an input error comes back and no session is created
    assert_eq!(response.code(), Some(ResponseCode::InputError));
    assert!(response.token.is_none());
    assert!(response.messages[0].contains("1024"));

    let next = send_json(&daemon.socket, &failed_login(None)).await;
    assert_eq!(next.code(), Some(ResponseCode::Success));

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_non_object_request_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    let response = send_raw(&daemon.socket, b"[1, 2, 3]".to_vec()).await;
    assert_eq!(response.code(), Some(ResponseCode::InputError));

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_silent_client_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).threads(1).build();
    let daemon = TestDaemon::start(dir, config).await;

    // A client that connects and hangs up without sending a frame
    drop(tokio::net::UnixStream::connect(&daemon.socket).await.unwrap());

    let response = send_json(&daemon.socket, &failed_login(None)).await;
    assert_eq!(response.code(), Some(ResponseCode::Success));

    daemon.stop().await;
}
