//! Command handlers -- one module per subcommand

pub mod config;
pub mod remove;
pub mod send;
pub mod status;

use std::path::{Path, PathBuf};

use tracing::debug;

use logtest_core::config::LogtestConfig;
use logtest_core::error::{ConfigError, LogtestError};

use crate::error::CliError;

/// Loads `config_path`, falling back to defaults when the file does not exist.
///
/// Parse and validation failures are still reported.
pub async fn load_config_or_default(config_path: &Path) -> Result<LogtestConfig, CliError> {
    match LogtestConfig::load(config_path).await {
        Ok(config) => Ok(config),
        Err(LogtestError::Config(ConfigError::FileNotFound { path })) => {
            debug!(path = %path, "config file not found, using defaults");
            let mut config = LogtestConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

/// Picks the daemon socket: `--socket` first, then the configuration.
pub async fn resolve_socket(
    socket: Option<&Path>,
    config_path: &Path,
) -> Result<PathBuf, CliError> {
    if let Some(path) = socket {
        return Ok(path.to_path_buf());
    }
    let config = load_config_or_default(config_path).await?;
    Ok(PathBuf::from(config.logtest.socket_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_socket_wins() {
        let socket = resolve_socket(
            Some(Path::new("/tmp/explicit.sock")),
            Path::new("/nonexistent/logtest.toml"),
        )
        .await
        .unwrap();
        assert_eq!(socket, PathBuf::from("/tmp/explicit.sock"));
    }

    #[tokio::test]
    async fn socket_comes_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.toml");
        std::fs::write(&path, "[logtest]\nsocket_path = \"/tmp/from-config.sock\"\n").unwrap();

        let socket = resolve_socket(None, &path).await.unwrap();
        assert_eq!(socket, PathBuf::from("/tmp/from-config.sock"));
    }

    #[tokio::test]
    async fn invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.toml");
        std::fs::write(&path, "[logtest\n").unwrap();

        let err = resolve_socket(None, &path).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
