//! `logtest remove` command handler

use std::path::Path;

use tracing::info;

use crate::cli::RemoveArgs;
use crate::client::LogtestClient;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `remove` command.
///
/// Removing an unknown session is reported by the daemon as a warning and
/// does not fail the command.
pub async fn execute(
    args: RemoveArgs,
    socket_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(token = %args.token, "removing session");

    let response = LogtestClient::new(socket_path)
        .remove_session(&args.token)
        .await?;
    writer.render(&response)?;

    if response.code().is_none_or(|code| code.is_error()) {
        return Err(CliError::Rejected(super::send::rejection_summary(&response)));
    }
    Ok(())
}
