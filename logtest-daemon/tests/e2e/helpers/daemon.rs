//! Handle for a daemon running inside the test runtime.

use std::path::PathBuf;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logtest_core::config::LogtestConfig;
use logtest_daemon::orchestrator::Orchestrator;

use super::client::wait_for_socket;

pub struct TestDaemon {
    pub dir: TempDir,
    pub socket: PathBuf,
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

#[allow(dead_code)]
impl TestDaemon {
    /// Builds the orchestrator from `config` and serves until [`TestDaemon::stop`].
    pub async fn start(dir: TempDir, config: LogtestConfig) -> Self {
        let socket = PathBuf::from(&config.logtest.socket_path);
        let orchestrator = Orchestrator::build_from_config(config)
            .await
            .expect("orchestrator should build");
        let shutdown = orchestrator.shutdown_token();
        let task =
            tokio::spawn(async move { orchestrator.run_until(std::future::pending()).await });

        wait_for_socket(&socket).await;
        Self {
            dir,
            socket,
            shutdown,
            task,
        }
    }

    /// Cancels the daemon and waits for it to finish.
    pub async fn stop(self) -> TempDir {
        self.shutdown.cancel();
        self.task
            .await
            .expect("daemon task should not panic")
            .expect("daemon should shut down cleanly");
        self.dir
    }
}
