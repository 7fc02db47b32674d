//! `logtest send` command handler

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use logtest_core::protocol::Response;

use crate::cli::{OutputFormat, SendArgs};
use crate::client::LogtestClient;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `send` command.
///
/// With an inline event one request is sent. Otherwise every non-empty
/// stdin line is sent in order, each request carrying the token returned
/// by the previous response so the whole stream shares one session.
pub async fn execute(
    args: SendArgs,
    socket_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let client = LogtestClient::new(socket_path);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.event.clone() {
        Some(event) => {
            let mut session = SendSession::new(&client, &args);
            session.send(&event, writer, &mut out).await?;
            session.finish()
        }
        None => {
            info!(socket = %socket_path.display(), "reading events from stdin");
            let stdin = BufReader::new(tokio::io::stdin());
            send_lines(&client, &args, stdin, writer, &mut out).await
        }
    }
}

/// Sends every non-empty line from `reader` through one session.
pub async fn send_lines<R>(
    client: &LogtestClient,
    args: &SendArgs,
    reader: R,
    writer: &OutputWriter,
    out: &mut dyn Write,
) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut session = SendSession::new(client, args);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        session.send(line, writer, out).await?;
    }
    session.finish()
}

/// Token and worst error carried across the requests of one `send` run.
struct SendSession<'a> {
    client: &'a LogtestClient,
    args: &'a SendArgs,
    token: Option<String>,
    sent: usize,
    rejected: Option<Response>,
}

impl<'a> SendSession<'a> {
    fn new(client: &'a LogtestClient, args: &'a SendArgs) -> Self {
        Self {
            client,
            args,
            token: args.token.clone(),
            sent: 0,
            rejected: None,
        }
    }

    async fn send(
        &mut self,
        event: &str,
        writer: &OutputWriter,
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let response = self
            .client
            .send_event(
                event,
                &self.args.location,
                &self.args.log_format,
                self.token.as_deref(),
            )
            .await?;

        if self.sent > 0 && writer.format() == OutputFormat::Text {
            writeln!(out)?;
        }
        writer.render_to(out, &response)?;
        self.sent += 1;

        if let Some(token) = &response.token {
            if self.token.as_deref() != Some(token.as_str()) {
                debug!(token = %token, "session token changed");
            }
            self.token = Some(token.clone());
        }
        if response.code().is_none_or(|code| code.is_error()) {
            self.rejected = Some(response);
        }
        Ok(())
    }

    fn finish(self) -> Result<(), CliError> {
        match self.rejected {
            Some(response) => Err(CliError::Rejected(rejection_summary(&response))),
            None => Ok(()),
        }
    }
}

pub(super) fn rejection_summary(response: &Response) -> String {
    if response.messages.is_empty() {
        format!("error code {}", response.error)
    } else {
        response.messages.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_summary_joins_messages() {
        let response = Response {
            messages: vec![
                "ERROR: Error parsing JSON".to_owned(),
                "ERROR: Error in position 3".to_owned(),
            ],
            error: 2,
            ..Default::default()
        };
        assert_eq!(
            rejection_summary(&response),
            "ERROR: Error parsing JSON; ERROR: Error in position 3"
        );
    }

    #[test]
    fn rejection_summary_without_messages() {
        let response = Response {
            error: 3,
            ..Default::default()
        };
        assert_eq!(rejection_summary(&response), "error code 3");
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let client = LogtestClient::new(dir.path().join("absent.sock"));
        let args = SendArgs {
            event: None,
            location: "stdin".to_owned(),
            log_format: "syslog".to_owned(),
            token: None,
        };
        let writer = OutputWriter::new(OutputFormat::Json);
        let mut out = Vec::new();

        send_lines(&client, &args, &b"\n   \n"[..], &writer, &mut out)
            .await
            .expect("blank lines never reach the socket");
        assert!(out.is_empty());
    }
}
