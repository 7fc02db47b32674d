//! Unix socket server -- worker pool, framing, and idle reaper.
//!
//! A fixed number of worker tasks share one listener; accept is serialized
//! by a mutex around it. Each connection carries exactly one request frame
//! and one response frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use logtest_core::config::{MAX_MESSAGE_SIZE, ServerConfig};
use logtest_core::metrics as m;
use logtest_core::protocol::{Response, frame_codec, is_frame_too_large};

use crate::dispatcher::Dispatcher;
use crate::sessions::SessionTable;

/// Maximum time one connection may take from accept to response.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause before a worker accepts again after a failed accept.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Permissions applied to the socket file.
pub const SOCKET_MODE: u32 = 0o660;

/// Binds the Unix socket, replacing a stale socket file left by a previous run.
pub fn bind_socket(path: &Path) -> Result<UnixListener> {
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            tracing::warn!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
        }
        Ok(_) => {
            anyhow::bail!(
                "{} exists and is not a socket, refusing to replace it",
                path.display()
            );
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).context(format!("failed to inspect {}", path.display())),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create socket directory {}", parent.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("failed to bind logtest socket {}", path.display()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
        .with_context(|| format!("failed to set permissions on {}", path.display()))?;

    tracing::info!(path = %path.display(), "logtest socket bound");
    Ok(listener)
}

/// Logtest session server.
pub struct LogtestServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl LogtestServer {
    pub fn new(config: ServerConfig, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Self {
        Self {
            config,
            dispatcher,
            shutdown,
        }
    }

    /// Serves `listener` until the shutdown token is cancelled.
    ///
    /// Workers and the reaper are joined before returning. The socket file,
    /// if `socket_path` is given, is removed afterwards.
    pub async fn run(self, listener: UnixListener, socket_path: Option<PathBuf>) -> Result<()> {
        let listener = Arc::new(Mutex::new(listener));
        let mut tasks = JoinSet::new();

        for worker_id in 0..self.config.threads.max(1) {
            tasks.spawn(worker(
                worker_id,
                Arc::clone(&listener),
                Arc::clone(&self.dispatcher),
                self.config.max_message_size,
                self.shutdown.clone(),
            ));
        }
        tasks.spawn(reaper(
            Arc::clone(self.dispatcher.sessions()),
            self.config.session_timeout(),
            self.shutdown.clone(),
        ));

        tracing::info!(
            workers = self.config.threads,
            max_sessions = self.config.max_sessions,
            session_timeout_secs = self.config.session_timeout_secs,
            "logtest server started"
        );

        self.shutdown.cancelled().await;
        tracing::info!("logtest server shutting down");

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "server task panicked");
            }
        }
        drop(listener);

        if let Some(path) = socket_path {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove socket");
            }
        }

        tracing::info!("logtest server stopped");
        Ok(())
    }
}

async fn worker(
    worker_id: usize,
    listener: Arc<Mutex<UnixListener>>,
    dispatcher: Arc<Dispatcher>,
    max_message_size: usize,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = async { listener.lock().await.accept().await } => result,
        };

        let stream = match accepted {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "failed to accept connection");
                if back_off(&shutdown).await {
                    continue;
                }
                break;
            }
        };

        match timeout(
            CONNECTION_TIMEOUT,
            serve_connection(stream, &dispatcher, max_message_size),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(worker_id, error = %e, "connection failed"),
            Err(_) => tracing::debug!(worker_id, "connection timed out"),
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}

/// Waits [`ACCEPT_ERROR_BACKOFF`] so a persistent accept error (e.g. `EMFILE`)
/// does not spin. Returns `false` if shutdown was requested meanwhile.
async fn back_off(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}

/// Reads one request frame, dispatches it and writes one response frame.
///
/// A frame over `max_message_size` is answered with an input error and no
/// session is touched.
pub async fn serve_connection(
    stream: UnixStream,
    dispatcher: &Dispatcher,
    max_message_size: usize,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, frame_codec(max_message_size));
    let mut writer = FramedWrite::new(write_half, frame_codec(MAX_MESSAGE_SIZE));

    let response = match reader.next().await {
        None => {
            tracing::debug!("connection closed before a request arrived");
            return Ok(());
        }
        Some(Ok(frame)) => dispatcher.dispatch(&frame).await,
        Some(Err(e)) if is_frame_too_large(&e) => {
            metrics::counter!(m::FRAME_ERRORS_TOTAL).increment(1);
            tracing::debug!(max_message_size, "request frame too large");
            Response::frame_error(format!(
                "Error receiving message: message exceeds {max_message_size} bytes"
            ))
        }
        Some(Err(e)) => return Err(e).context("failed to read request frame"),
    };

    let payload = response.to_bytes()?;
    writer
        .send(Bytes::from(payload))
        .await
        .context("failed to write response frame")?;
    Ok(())
}

/// Every `period`, drops sessions idle for at least `period`.
async fn reaper<S>(
    sessions: Arc<SessionTable<S>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let reaped = sessions.sweep(tokio::time::Instant::now(), period).await;
                if reaped > 0 {
                    tracing::info!(reaped, "expired idle sessions");
                }
            }
        }
    }
    tracing::debug!("reaper stopped");
}
