//! Request dispatch -- turns one raw request frame into one response.
//!
//! Every failure below the framing layer ends up as diagnostics in the
//! response; nothing here returns an error to the connection handler.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use logtest_analysis::AnalysisSession;
use logtest_core::config::AnalysisConfig;
use logtest_core::error::SessionError;
use logtest_core::metrics as m;
use logtest_core::protocol::{Diagnostics, LogRequest, Request, Response};

use crate::sessions::{Origin, SessionTable};

/// Shared table type used by the daemon.
pub type Sessions = SessionTable<AnalysisSession>;

/// Routes classified requests to the session table and the analysis pipeline.
pub struct Dispatcher {
    sessions: Arc<Sessions>,
    analysis: AnalysisConfig,
}

impl Dispatcher {
    pub fn new(sessions: Arc<Sessions>, analysis: AnalysisConfig) -> Self {
        Self { sessions, analysis }
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    /// Handles one raw request.
    pub async fn dispatch(&self, raw: &[u8]) -> Response {
        let started = Instant::now();
        let mut diags = Diagnostics::new();

        let (kind, response) = match Request::parse(raw, &mut diags) {
            Some(Request::Log(request)) => ("log", self.process_log(request, diags).await),
            Some(Request::RemoveSession { token }) => (
                "remove_session",
                self.remove_session(&token, diags).await,
            ),
            None => ("rejected", Response::from_diagnostics(&diags)),
        };

        metrics::counter!(m::REQUESTS_TOTAL, m::LABEL_REQUEST_KIND => kind).increment(1);
        metrics::histogram!(m::REQUEST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        if let Some(code) = response.code().filter(|code| code.is_error()) {
            metrics::counter!(m::REQUEST_ERRORS_TOTAL, m::LABEL_CODE => code.to_string())
                .increment(1);
        }
        if response.alert == Some(true) {
            metrics::counter!(m::ALERTS_TOTAL).increment(1);
        }

        tracing::debug!(kind, code = response.error, token = response.token.as_deref().unwrap_or("-"), "request handled");
        response
    }

    async fn process_log(&self, request: LogRequest, mut diags: Diagnostics) -> Response {
        let requested = request.token.as_deref();
        let analysis = &self.analysis;

        let acquired = self
            .sessions
            .get_or_create(requested, || async move {
                AnalysisSession::load(analysis, Utc::now())
                    .await
                    .map_err(|e| SessionError::InitFailed {
                        reason: e.to_string(),
                    })
            })
            .await;

        let mut acquired = match acquired {
            Ok(acquired) => acquired,
            Err(err) => {
                tracing::warn!(error = %err, "failed to initialize session");
                if let Some(stale) = requested {
                    diags.warn(stale_token_message(stale));
                }
                diags.error(err.to_string());
                return Response::from_diagnostics(&diags);
            }
        };

        match &acquired.origin {
            Origin::Existing => {}
            Origin::Created => {
                diags.info(format!("Session initialized with token '{}'", acquired.token));
            }
            Origin::Replaced { stale } => {
                diags.warn(stale_token_message(stale));
                diags.info(format!("Session initialized with token '{}'", acquired.token));
            }
        }

        let processed = acquired
            .guard
            .payload
            .process(&request, Utc::now(), &mut diags);
        let token = std::mem::take(&mut acquired.token);
        drop(acquired);

        let (output, alert) = match processed {
            Ok(outcome) => (Some(outcome.output), outcome.alert),
            Err(err) => {
                diags.error(err.to_string());
                diags.error("Failed to process the event");
                (None, false)
            }
        };

        let mut response = Response::from_diagnostics(&diags);
        response.token = Some(token);
        response.output = output;
        if !diags.code().is_error() {
            response.alert = Some(alert);
        }
        response
    }

    async fn remove_session(&self, token: &str, mut diags: Diagnostics) -> Response {
        if self.sessions.remove(token).await {
            diags.info(format!("The session '{token}' was closed successfully"));
        } else {
            diags.warn(format!("No session found for token '{token}'"));
        }
        Response::from_diagnostics(&diags)
    }
}

fn stale_token_message(token: &str) -> String {
    format!("'{token}' token expired or unknown, a new session was started")
}
