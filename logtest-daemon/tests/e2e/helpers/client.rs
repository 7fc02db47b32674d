//! Minimal framed client for the logtest socket.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use logtest_core::config::MAX_MESSAGE_SIZE;
use logtest_core::protocol::{Response, frame_codec};

pub const FAILED_PASSWORD: &str = "Jul 1 12:00:00 host sshd: Failed password for root";

/// Sends one raw frame and reads the single response frame.
pub async fn send_raw(socket: &Path, payload: Vec<u8>) -> Response {
    let stream = UnixStream::connect(socket)
        .await
        .expect("should connect to logtest socket");
    let mut framed = Framed::new(stream, frame_codec(MAX_MESSAGE_SIZE));
    framed
        .send(Bytes::from(payload))
        .await
        .expect("should send request frame");
    let frame = framed
        .next()
        .await
        .expect("should receive a response frame")
        .expect("response frame should be readable");
    Response::from_slice(&frame).expect("response should be valid JSON")
}

pub async fn send_json(socket: &Path, request: &Value) -> Response {
    send_raw(socket, serde_json::to_vec(request).expect("request should serialize")).await
}

/// Log request for the sshd failure fixture, optionally bound to a token.
pub fn failed_login(token: Option<&str>) -> Value {
    let mut request = serde_json::json!({
        "event": FAILED_PASSWORD,
        "location": "/var/log/auth.log",
        "log_format": "syslog",
    });
    if let Some(token) = token {
        request["token"] = Value::from(token);
    }
    request
}

/// Waits until the daemon has bound its socket.
pub async fn wait_for_socket(socket: &Path) {
    for _ in 0..200 {
        if UnixStream::connect(socket).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("socket {} never became connectable", socket.display());
}
