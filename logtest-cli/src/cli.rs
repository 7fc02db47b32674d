//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// logtest -- evaluate log lines against a running logtest daemon.
///
/// Use `logtest <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logtest", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logtest.toml configuration file.
    #[arg(short, long, default_value = "/etc/logtest/logtest.toml", global = true)]
    pub config: PathBuf,

    /// Daemon socket path (overrides `logtest.socket_path` from the config file).
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one event, or every line read from stdin.
    Send(SendArgs),

    /// Close a session on the daemon.
    Remove(RemoveArgs),

    /// Check whether the daemon is running and reachable.
    Status,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- send ----

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Raw log line. Lines are read from stdin when omitted.
    pub event: Option<String>,

    /// Location reported for the event.
    #[arg(long, default_value = "stdin")]
    pub location: String,

    /// Log format of the event (syslog, json, ...).
    #[arg(long, default_value = "syslog")]
    pub log_format: String,

    /// Session token to reuse.
    #[arg(long)]
    pub token: Option<String>,
}

// ---- remove ----

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Token of the session to close.
    pub token: String,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and load the ruleset it points to.
    Validate,

    /// Show the effective configuration.
    Show {
        /// Show only a specific section (general, logtest, analysis, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
