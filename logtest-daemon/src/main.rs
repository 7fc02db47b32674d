use anyhow::{Context, Result};
use clap::Parser;

use logtest_core::config::LogtestConfig;
use logtest_daemon::cli::DaemonCli;
use logtest_daemon::logging;
use logtest_daemon::orchestrator::{Orchestrator, validate_ruleset};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogtestConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    // CLI flags take precedence over the file and environment variables
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }
    config.validate().context("invalid configuration")?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        let summary = validate_ruleset(&config.analysis).await?;
        println!(
            "configuration is valid: {} decoders, {} rules, {} lists",
            summary.decoders, summary.rules, summary.lists
        );
        return Ok(());
    }

    if !config.logtest.enabled {
        tracing::info!("logtest is disabled, exiting");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logtest-daemon starting");
    let orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;
    tracing::info!("logtest-daemon shut down");
    Ok(())
}
