//! S3: Startup and shutdown.
//!
//! Validates PID file handling, socket cleanup and fatal startup errors.

use logtest_daemon::orchestrator::Orchestrator;

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::daemon::TestDaemon;

#[tokio::test]
async fn test_e2e_shutdown_removes_socket_and_pid_file() {
    // Given: a daemon configured with a PID file
    let dir = tempfile::tempdir().unwrap();
    let pid_path = dir.path().join("run/logtest.pid");
    let config = TestConfigBuilder::new(dir.path()).pid_file(&pid_path).build();
    let daemon = TestDaemon::start(dir, config).await;

    // Then: the PID file holds our PID while running
    let content = std::fs::read_to_string(&pid_path).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
    let socket = daemon.socket.clone();

    // When: the daemon stops
    let dir = daemon.stop().await;

    // Then: both files are gone
    assert!(!pid_path.exists());
    assert!(!socket.exists());
    drop(dir);
}

#[tokio::test]
async fn test_e2e_existing_pid_file_blocks_startup() {
    let dir = tempfile::tempdir().unwrap();
    let pid_path = dir.path().join("logtest.pid");
    std::fs::write(&pid_path, "4242\n").unwrap();
    let config = TestConfigBuilder::new(dir.path()).pid_file(&pid_path).build();

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator
        .run_until(std::future::ready(()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("4242"));
    // The foreign PID file is left alone
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242\n");
}

#[tokio::test]
async fn test_e2e_invalid_ruleset_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules");
    std::fs::create_dir(&rules).unwrap();
    std::fs::write(rules.join("broken.yml"), "- rules: [ {id: 1} ]").unwrap();
    let config = TestConfigBuilder::new(dir.path())
        .rule_paths(vec![rules.display().to_string()])
        .build();

    let err = Orchestrator::build_from_config(config)
        .await
        .err()
        .expect("broken ruleset should abort startup");

    assert!(format!("{err:#}").contains("broken.yml"));
}

#[tokio::test]
async fn test_e2e_invalid_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestConfigBuilder::new(dir.path()).build();
    config.logtest.threads = 0;

    let result = Orchestrator::build_from_config(config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_e2e_stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("logtest.sock");
    // A socket left over from a crashed run
    drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
    assert!(socket.exists());

    let config = TestConfigBuilder::new(dir.path()).build();
    let daemon = TestDaemon::start(dir, config).await;
    daemon.stop().await;
}
