//! CLI argument definitions for logtest-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logtest session server.
///
/// Accepts log-evaluation requests on a Unix socket and runs them through
/// per-client decoding and rule-matching sessions.
#[derive(Parser, Debug)]
#[command(name = "logtest-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logtest.toml configuration file.
    #[arg(short, long, default_value = "/etc/logtest/logtest.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and ruleset, then exit without starting the server.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}
