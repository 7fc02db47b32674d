//! CLI-specific error types and exit code mapping

use logtest_analysis::AnalysisError;
use logtest_core::error::{LogtestError, ProtocolError};

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The ruleset referenced by the configuration failed to load.
    #[error("ruleset error: {0}")]
    Ruleset(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Cannot connect to the daemon socket.
    #[error("daemon not reachable: {0}")]
    DaemonUnavailable(String),

    /// The daemon sent something that is not a valid response frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The daemon answered with an error code.
    #[error("request rejected by daemon: {0}")]
    Rejected(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdin read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logtest-core.
    #[error("{0}")]
    Core(#[from] LogtestError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | General / command error              |
    /// | 2    | Configuration or ruleset error       |
    /// | 3    | Daemon unreachable                   |
    /// | 4    | Daemon rejected or failed a request  |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Ruleset(_) | Self::Core(LogtestError::Config(_)) => 2,
            Self::DaemonUnavailable(_) => 3,
            Self::Rejected(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Protocol(_) | Self::Core(_) => 1,
        }
    }
}

impl From<AnalysisError> for CliError {
    fn from(e: AnalysisError) -> Self {
        Self::Ruleset(e.to_string())
    }
}

impl From<ProtocolError> for CliError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtest_core::error::ConfigError;

    #[test]
    fn exit_code_config_error() {
        let err = CliError::Config("bad value".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn exit_code_core_config_error() {
        let err = CliError::from(LogtestError::Config(ConfigError::FileNotFound {
            path: "/nonexistent.toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2, "core config error should map to 2");
    }

    #[test]
    fn exit_code_ruleset_error() {
        let err = CliError::Ruleset("broken.yml: invalid regex".to_owned());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn exit_code_daemon_unavailable() {
        let err = CliError::DaemonUnavailable("connection refused".to_owned());
        assert_eq!(
            err.exit_code(),
            3,
            "daemon unavailable should return exit code 3"
        );
    }

    #[test]
    fn exit_code_rejected() {
        let err = CliError::Rejected("ERROR: Error parsing JSON".to_owned());
        assert_eq!(err.exit_code(), 4, "rejected request should return exit code 4");
    }

    #[test]
    fn exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn exit_code_protocol_and_command() {
        assert_eq!(CliError::Protocol("short frame".to_owned()).exit_code(), 1);
        assert_eq!(CliError::Command("unknown section".to_owned()).exit_code(), 1);
    }

    #[test]
    fn protocol_error_converts() {
        let err: CliError = ProtocolError::Decode {
            reason: "expected value".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Protocol(_)));
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn rejected_message_is_displayed() {
        let err = CliError::Rejected("ERROR: missing field 'location'".to_owned());
        assert_eq!(
            err.to_string(),
            "request rejected by daemon: ERROR: missing field 'location'"
        );
    }
}
