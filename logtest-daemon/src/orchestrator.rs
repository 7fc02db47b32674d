//! Daemon orchestration -- startup checks, server lifecycle, and shutdown.
//!
//! The [`Orchestrator`] validates the configuration and the ruleset, installs
//! the metrics recorder, writes the PID file, and runs the logtest server
//! until a shutdown signal arrives.
//!
//! # Shutdown Order
//!
//! 1. Cancel the shutdown token (workers stop accepting, reaper stops)
//! 2. Join the server, which removes the socket file
//! 3. Drop the session table
//! 4. Remove the PID file

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use logtest_analysis::Ruleset;
use logtest_core::config::{AnalysisConfig, LogtestConfig};

use crate::dispatcher::Dispatcher;
use crate::metrics_server;
use crate::server::{LogtestServer, bind_socket};
use crate::sessions::SessionTable;

/// How often the uptime gauge is refreshed.
const UPTIME_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Counts reported after a successful ruleset check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesetSummary {
    pub decoders: usize,
    pub rules: usize,
    pub lists: usize,
}

/// Loads the configured ruleset once to make sure every session can be built.
///
/// # Errors
///
/// Returns the load error with the offending file path.
pub async fn validate_ruleset(analysis: &AnalysisConfig) -> Result<RulesetSummary> {
    let ruleset = Ruleset::load(analysis)
        .await
        .context("failed to load ruleset")?;
    let summary = RulesetSummary {
        decoders: ruleset.decoders.len(),
        rules: ruleset.rules.len(),
        lists: ruleset.lists.len(),
    };
    tracing::info!(
        decoders = summary.decoders,
        rules = summary.rules,
        lists = summary.lists,
        "ruleset validated"
    );
    Ok(summary)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogtestConfig,
    /// Cancelled once to stop every background task.
    shutdown: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogtestConfig::load(config_path)
            .await
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The ruleset cannot be loaded
    /// - The metrics recorder cannot be installed
    pub async fn build_from_config(config: LogtestConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;
        validate_ruleset(&config.analysis).await?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Serve until `SIGTERM` or `SIGINT`.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Serve until `stop` completes or the shutdown token is cancelled.
    pub async fn run_until<F>(&self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let pid_file = self.pid_file();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        let result = self.serve(stop).await;

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }
        result
    }

    /// Token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogtestConfig {
        &self.config
    }

    async fn serve<F>(&self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let socket_path = PathBuf::from(&self.config.logtest.socket_path);
        let listener = bind_socket(&socket_path)?;

        let sessions = Arc::new(SessionTable::new(self.config.logtest.max_sessions));
        let dispatcher = Arc::new(Dispatcher::new(sessions, self.config.analysis.clone()));
        let server = LogtestServer::new(
            self.config.logtest.clone(),
            dispatcher,
            self.shutdown.clone(),
        );
        let server_task = tokio::spawn(server.run(listener, Some(socket_path)));

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.clone()));

        tokio::select! {
            _ = stop => {}
            _ = self.shutdown.cancelled() => tracing::info!("shutdown requested"),
        }
        self.shutdown.cancel();

        let served = server_task.await.context("server task panicked")?;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }
        served
    }

    fn pid_file(&self) -> Option<PathBuf> {
        let path = self.config.general.pid_file.as_str();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to `path`.
///
/// The file is created exclusively with mode 0o600, so a second daemon
/// pointed at the same path fails instead of overwriting it. The parent
/// directory is created with mode 0o700 when missing.
///
/// # Errors
///
/// Returns an error if the file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};
    use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(parent)
            .with_context(|| format!("failed to create PID directory {}", parent.display()))?;
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
    {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            anyhow::bail!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to create PID file {}", path.display()));
        }
    };

    writeln!(file, "{pid}")?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file, logging instead of failing.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Refreshes the uptime gauge until shutdown.
fn spawn_uptime_updater(
    start_time: Instant,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use logtest_core::metrics as m;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(UPTIME_REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs_f64());
                }
                _ = shutdown.cancelled() => break,
            }
        }
    })
}
