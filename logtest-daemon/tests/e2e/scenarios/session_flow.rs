//! S1: Session lifecycle through the socket.
//!
//! Validates token issuance, correlation across requests with the same
//! token, unknown tokens, removal and capacity eviction.

use serde_json::json;

use logtest_core::protocol::ResponseCode;

use crate::helpers::client::{failed_login, send_json};
use crate::helpers::config::{TestConfigBuilder, fixture};
use crate::helpers::daemon::TestDaemon;

#[tokio::test]
async fn test_e2e_second_failure_with_token_alerts() {
    // Given: a running daemon with a rule that fires on two failures within 60 s
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    // When: the first request carries no token
    let first = send_json(&daemon.socket, &failed_login(None)).await;

    // Then: a fresh token, success code and decoded output come back
    assert_eq!(first.code(), Some(ResponseCode::Success));
    let token = first.token.clone().expect("token should be issued");
    assert_eq!(token.len(), 8);
    assert_eq!(first.alert, Some(false));
    let output = first.output.expect("output should be present");
    assert_eq!(output["decoder"]["name"], "sshd");
    assert_eq!(output["rule"]["id"], "5710");
    assert_eq!(output["full_log"], crate::helpers::client::FAILED_PASSWORD);

    // When: the same event is sent again with the token
    let second = send_json(&daemon.socket, &failed_login(Some(&token))).await;

    // Then: the correlation rule fires
    assert_eq!(second.code(), Some(ResponseCode::Success));
    assert_eq!(second.token.as_deref(), Some(token.as_str()));
    assert_eq!(second.alert, Some(true));
    assert_eq!(second.output.unwrap()["rule"]["id"], "5712");

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    let a = send_json(&daemon.socket, &failed_login(None)).await;
    let b = send_json(&daemon.socket, &failed_login(None)).await;

    assert_ne!(a.token, b.token);
    assert_eq!(b.alert, Some(false));

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_unknown_token_starts_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    let response = send_json(&daemon.socket, &failed_login(Some("cafebabe"))).await;

    assert_eq!(response.code(), Some(ResponseCode::Warning));
    let token = response.token.unwrap();
    assert_ne!(token, "cafebabe");
    assert!(response.messages.iter().any(|m| m.contains("'cafebabe'")));
    assert!(
        response
            .messages
            .iter()
            .any(|m| m == &format!("INFO: Session initialized with token '{token}'"))
    );

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_remove_session_twice() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;

    let token = send_json(&daemon.socket, &failed_login(None))
        .await
        .token
        .unwrap();
    let remove = json!({ "remove_session": token });

    let first = send_json(&daemon.socket, &remove).await;
    let second = send_json(&daemon.socket, &remove).await;

    assert_eq!(first.code(), Some(ResponseCode::Success));
    assert_eq!(second.code(), Some(ResponseCode::Warning));

    // The removed token no longer reaches the old correlation state
    let after = send_json(&daemon.socket, &failed_login(Some(&token))).await;
    assert_eq!(after.code(), Some(ResponseCode::Warning));
    assert_eq!(after.alert, Some(false));

    daemon.stop().await;
}

#[tokio::test]
async fn test_e2e_full_table_evicts_least_recent() {
    // Given: a table with room for two sessions
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).max_sessions(2).build();
    let daemon = TestDaemon::start(dir, config).await;

    let oldest = send_json(&daemon.socket, &failed_login(None)).await.token.unwrap();
    let middle = send_json(&daemon.socket, &failed_login(None)).await.token.unwrap();

    // When: a third session is created
    send_json(&daemon.socket, &failed_login(None)).await;

    // Then: the middle session is still live and the oldest is gone
    let reuse_middle = send_json(&daemon.socket, &failed_login(Some(&middle))).await;
    assert_eq!(reuse_middle.code(), Some(ResponseCode::Success));
    assert_eq!(reuse_middle.alert, Some(true));

    let reuse_oldest = send_json(&daemon.socket, &failed_login(Some(&oldest))).await;
    assert_eq!(reuse_oldest.code(), Some(ResponseCode::Warning));

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_e2e_concurrent_requests_share_serialized_state() {
    // Given: one session, four server workers and a 5712 that needs 100 failures,
    // so every failure is recorded against 5710
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path())
        .threads(4)
        .rule_paths(vec![fixture("rules_slow_escalation")])
        .build();
    let daemon = TestDaemon::start(dir, config).await;
    let first = send_json(&daemon.socket, &failed_login(None)).await;
    assert_eq!(first.output.as_ref().unwrap()["rule"]["firedtimes"], 1);
    let token = first.token.unwrap();

    // When: eight clients send the same event with that token at once
    let mut clients = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let socket = daemon.socket.clone();
        let request = failed_login(Some(&token));
        clients.spawn(async move { send_json(&socket, &request).await });
    }

    // Then: each request saw a distinct count, so no update was lost
    let mut counts = Vec::new();
    while let Some(joined) = clients.join_next().await {
        let response = joined.unwrap();
        assert_eq!(response.code(), Some(ResponseCode::Success));
        let output = response.output.unwrap();
        assert_eq!(output["rule"]["id"], "5710");
        counts.push(output["rule"]["firedtimes"].as_u64().unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (2..=9).collect::<Vec<u64>>());

    let last = send_json(&daemon.socket, &failed_login(Some(&token))).await;
    assert_eq!(last.output.unwrap()["rule"]["firedtimes"], 10);

    daemon.stop().await;
}
