//! Common test utilities for gateway integration tests
//!
//! `MockGateway` speaks just enough of the gateway protocol to drive the
//! client: it sends a configurable first frame, optionally acks heartbeats,
//! optionally answers IDENTIFY with READY, records everything the client sends
//! and can push arbitrary messages to the client.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Route gateway logs to the test output when TEST_VERBOSE is set
pub fn init_test_tracing() {
    if std::env::var("TEST_VERBOSE").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("gateway=debug")
            .with_test_writer()
            .try_init();
    }
}

/// What the mock saw from the client
#[derive(Debug, Clone)]
pub enum Seen {
    Frame(Value),
    Close(Option<u16>),
}

/// Mock behaviour
#[derive(Debug, Clone)]
pub struct MockSettings {
    /// First frame sent after the upgrade
    pub first_frame: Value,
    /// Reply to every heartbeat with op 11
    pub ack_heartbeats: bool,
    /// READY payload sent in reply to IDENTIFY
    pub ready: Option<Value>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            first_frame: hello(45_000),
            ack_heartbeats: true,
            ready: Some(ready_payload("session-1")),
        }
    }
}

pub fn hello(interval_ms: i64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": interval_ms, "_trace": ["mock-gateway"]}})
}

pub fn ready_payload(session_id: &str) -> Value {
    json!({
        "v": 6,
        "user": {"id": "80351110224678912", "username": "Nelly", "discriminator": "1337", "bot": true},
        "private_channels": [],
        "guilds": [{"id": "41771983423143937", "unavailable": true}],
        "session_id": session_id,
        "_trace": ["mock-session"]
    })
}

pub struct MockGateway {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    seen: mpsc::UnboundedReceiver<Seen>,
    push: mpsc::UnboundedSender<Message>,
    request: Arc<Mutex<Option<(String, HeaderMap)>>>,
}

impl MockGateway {
    pub async fn start() -> Self {
        Self::start_with(MockSettings::default()).await
    }

    /// Start a mock that serves a single client connection
    pub async fn start_with(settings: MockSettings) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let request = Arc::new(Mutex::new(None));
        let (seen_tx, seen) = mpsc::unbounded_channel();
        let (push, push_rx) = mpsc::unbounded_channel();

        {
            let shutdown = shutdown.clone();
            let request = Arc::clone(&request);
            tokio::spawn(async move {
                tokio::select! {
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            handle_connection(stream, settings, seen_tx, push_rx, request, shutdown).await;
                        }
                    }
                    _ = shutdown.cancelled() => {}
                }
            });
        }

        Self {
            addr,
            shutdown,
            seen,
            push,
            request,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Request URI and headers of the upgrade request
    pub fn upgrade_request(&self) -> Option<(String, HeaderMap)> {
        self.request.lock().clone()
    }

    pub fn push_json(&self, value: Value) {
        let _ = self.push.send(Message::Text(value.to_string()));
    }

    pub fn push_close(&self, code: u16, reason: &str) {
        let _ = self.push.send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        })));
    }

    /// Next frame with opcode `op`, skipping anything else
    pub async fn next_frame_with_op(&mut self, op: u64, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.seen.recv()).await {
                Ok(Some(Seen::Frame(frame))) if frame["op"].as_u64() == Some(op) => return Some(frame),
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Close code of the next close frame, skipping data frames
    pub async fn next_close(&mut self, timeout: Duration) -> Option<Option<u16>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.seen.recv()).await {
                Ok(Some(Seen::Close(code))) => return Some(code),
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Drop the socket without a close frame
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    settings: MockSettings,
    seen: mpsc::UnboundedSender<Seen>,
    mut push: mpsc::UnboundedReceiver<Message>,
    request: Arc<Mutex<Option<(String, HeaderMap)>>>,
    shutdown: CancellationToken,
) {
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        *request.lock() = Some((req.uri().to_string(), req.headers().clone()));
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    if write
        .send(Message::Text(settings.first_frame.to_string()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(_) => continue,
                        };
                        let op = frame["op"].as_u64();
                        let _ = seen.send(Seen::Frame(frame));

                        let reply = match op {
                            Some(1) if settings.ack_heartbeats => Some(json!({"op": 11})),
                            Some(2) => settings
                                .ready
                                .as_ref()
                                .map(|ready| json!({"op": 0, "t": "READY", "s": 1, "d": ready})),
                            _ => None,
                        };
                        if let Some(reply) = reply {
                            if write.send(Message::Text(reply.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let _ = seen.send(Seen::Close(frame.map(|f| u16::from(f.code))));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }

            pushed = push.recv() => {
                match pushed {
                    Some(message) => {
                        let is_close = message.is_close();
                        if write.send(message).await.is_err() || is_close {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = shutdown.cancelled() => {
                break;
            }
        }
    }
}
