//! `logtest status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::LogtestClient;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

use super::load_config_or_default;

/// Execute the `status` command.
pub async fn execute(
    socket: Option<&Path>,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config_or_default(config_path).await?;
    let socket_path = socket
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.logtest.socket_path.clone().into());

    let pid = read_live_pid(&config.general.pid_file);
    let reachable = match LogtestClient::new(&socket_path).probe().await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "socket probe failed");
            false
        }
    };

    let report = StatusReport {
        enabled: config.logtest.enabled,
        socket: socket_path.display().to_string(),
        socket_reachable: reachable,
        pid_file: (!config.general.pid_file.is_empty()).then(|| config.general.pid_file.clone()),
        pid,
    };
    writer.render(&report)?;
    Ok(())
}

/// Reads the PID file and returns the PID if that process is alive.
fn read_live_pid(pid_file: &str) -> Option<u32> {
    if pid_file.is_empty() {
        return None;
    }

    let content = match std::fs::read_to_string(pid_file) {
        Ok(content) => content,
        Err(e) => {
            debug!(pid_file, error = %e, "pid file not readable");
            return None;
        }
    };

    match content.trim().parse::<u32>() {
        Ok(pid) if is_process_alive(pid) => Some(pid),
        Ok(pid) => {
            warn!(pid_file, pid, "stale pid file");
            None
        }
        Err(e) => {
            warn!(pid_file, error = %e, "failed to parse pid");
            None
        }
    }
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) with signal 0 only checks for existence and permissions
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || std::io::Error::last_os_error().kind() == std::io::ErrorKind::PermissionDenied
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub enabled: bool,
    pub socket: String,
    pub socket_reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<String>,
    pub pid: Option<u32>,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let daemon = match (self.pid, self.socket_reachable) {
            (_, true) => "running".green().bold(),
            (Some(_), false) => "running (socket unreachable)".yellow().bold(),
            (None, false) => "not running".red().bold(),
        };
        writeln!(w, "Daemon: {daemon}")?;
        if let Some(pid) = self.pid {
            writeln!(w, "  PID:     {pid}")?;
        }
        if let Some(pid_file) = &self.pid_file {
            writeln!(w, "  PID file: {}", pid_file.dimmed())?;
        }
        writeln!(w, "  Socket:  {}", self.socket)?;
        if !self.enabled {
            writeln!(w, "  {}", "logtest is disabled in the configuration".yellow())?;
        }
        Ok(())
    }
}
