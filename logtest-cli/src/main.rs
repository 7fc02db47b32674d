//! logtest -- command-line client for the logtest daemon.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use logtest_cli::cli::{Cli, Commands};
use logtest_cli::commands;
use logtest_cli::error::CliError;
use logtest_cli::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr.
    let filter = cli
        .log_level
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(|| {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Send(args) => {
            let socket = commands::resolve_socket(cli.socket.as_deref(), &cli.config).await?;
            commands::send::execute(args, &socket, &writer).await
        }
        Commands::Remove(args) => {
            let socket = commands::resolve_socket(cli.socket.as_deref(), &cli.config).await?;
            commands::remove::execute(args, &socket, &writer).await
        }
        Commands::Status => {
            commands::status::execute(cli.socket.as_deref(), &cli.config, &writer).await
        }
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
