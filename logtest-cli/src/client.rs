//! Framed Unix socket client for the logtest daemon.
//!
//! Every request opens a new connection, writes one length-prefixed JSON
//! frame and reads one response frame back.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::debug;

use logtest_core::config::MAX_MESSAGE_SIZE;
use logtest_core::protocol::{
    FIELD_EVENT, FIELD_LOCATION, FIELD_LOG_FORMAT, FIELD_REMOVE_SESSION, FIELD_TOKEN, Response,
    frame_codec,
};

use crate::error::CliError;

/// Client bound to one daemon socket.
#[derive(Debug, Clone)]
pub struct LogtestClient {
    socket_path: PathBuf,
}

impl LogtestClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends one event for evaluation.
    pub async fn send_event(
        &self,
        event: &str,
        location: &str,
        log_format: &str,
        token: Option<&str>,
    ) -> Result<Response, CliError> {
        let mut request = json!({
            FIELD_EVENT: event,
            FIELD_LOCATION: location,
            FIELD_LOG_FORMAT: log_format,
        });
        if let (Some(token), Value::Object(map)) = (token, &mut request) {
            map.insert(FIELD_TOKEN.to_owned(), Value::String(token.to_owned()));
        }
        self.request(&request).await
    }

    /// Asks the daemon to close the session behind `token`.
    pub async fn remove_session(&self, token: &str) -> Result<Response, CliError> {
        self.request(&json!({ FIELD_REMOVE_SESSION: token })).await
    }

    /// Checks that the socket accepts connections.
    pub async fn probe(&self) -> Result<(), CliError> {
        self.connect().await.map(drop)
    }

    /// Writes `body` as one frame and decodes the daemon's response frame.
    pub async fn request(&self, body: &Value) -> Result<Response, CliError> {
        let payload = serde_json::to_vec(body)?;
        let stream = self.connect().await?;
        let mut framed = Framed::new(stream, frame_codec(MAX_MESSAGE_SIZE));

        debug!(bytes = payload.len(), socket = %self.socket_path.display(), "sending request");
        framed.send(Bytes::from(payload)).await?;

        let frame = framed.next().await.ok_or_else(|| {
            CliError::Protocol("daemon closed the connection without a response".to_owned())
        })??;
        let response = Response::from_slice(&frame)?;
        debug!(code = response.error, "received response");
        Ok(response)
    }

    async fn connect(&self) -> Result<UnixStream, CliError> {
        UnixStream::connect(&self.socket_path).await.map_err(|e| {
            CliError::DaemonUnavailable(format!("{}: {e}", self.socket_path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    /// Accepts one connection and answers it with `reply`, returning the request body.
    fn spawn_one_shot(listener: UnixListener, reply: Response) -> tokio::task::JoinHandle<Value> {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut framed = Framed::new(stream, frame_codec(MAX_MESSAGE_SIZE));
            let frame = framed.next().await.expect("frame").expect("valid frame");
            let body: Value = serde_json::from_slice(&frame).expect("request is JSON");
            let bytes = reply.to_bytes().expect("encode reply");
            framed.send(Bytes::from(bytes)).await.expect("send reply");
            body
        })
    }

    #[tokio::test]
    async fn send_event_builds_request_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = spawn_one_shot(
            listener,
            Response {
                token: Some("a1b2c3d4".to_owned()),
                ..Default::default()
            },
        );

        let client = LogtestClient::new(&path);
        let response = client
            .send_event("hello", "stdin", "syslog", Some("a1b2c3d4"))
            .await
            .unwrap();
        assert_eq!(response.token.as_deref(), Some("a1b2c3d4"));

        let body = server.await.unwrap();
        assert_eq!(body["event"], "hello");
        assert_eq!(body["location"], "stdin");
        assert_eq!(body["log_format"], "syslog");
        assert_eq!(body["token"], "a1b2c3d4");
    }

    #[tokio::test]
    async fn send_event_without_token_omits_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = spawn_one_shot(listener, Response::default());

        LogtestClient::new(&path)
            .send_event("hello", "stdin", "syslog", None)
            .await
            .unwrap();

        let body = server.await.unwrap();
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn remove_session_request_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = spawn_one_shot(listener, Response::default());

        LogtestClient::new(&path)
            .remove_session("a1b2c3d4")
            .await
            .unwrap();

        let body = server.await.unwrap();
        assert_eq!(body, json!({"remove_session": "a1b2c3d4"}));
    }

    #[tokio::test]
    async fn missing_socket_is_daemon_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let client = LogtestClient::new(dir.path().join("absent.sock"));

        let err = client.probe().await.unwrap_err();
        assert!(matches!(err, CliError::DaemonUnavailable(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn closed_connection_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logtest.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            drop(stream);
        });

        let err = LogtestClient::new(&path)
            .send_event("hello", "stdin", "syslog", None)
            .await
            .unwrap_err();
        server.await.unwrap();
        assert!(
            matches!(err, CliError::Protocol(_) | CliError::Io(_)),
            "unexpected error: {err:?}"
        );
    }
}
