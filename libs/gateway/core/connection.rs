//! Gateway connection
//!
//! `GatewayConnection::connect` dials the socket, waits for HELLO and then
//! starts exactly two background tasks bound to one cancellation token:
//!
//! ```text
//!            ┌────────────────────┐     send_frame / send_close
//!  caller ──>│   SocketWriter     │<──────────────────────────── heartbeat monitor
//!            │ (single write lock)│<──────────────────────────── built-in listeners
//!            └────────────────────┘
//!  socket ──> receive loop ──> DispatchRouter ──> listener tasks
//! ```
//!
//! Fatal conditions in either task (read failure, ack timeout, server close,
//! reconnect request, invalid session) end the connection: the first reason
//! wins, state becomes `Closed`, the owner is notified through
//! [`ConnectionEvent::Disconnected`] and [`GatewayConnection::wait_closed`],
//! and the token is cancelled so the other task stops as well.

use crate::core::config::GatewayConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::heartbeat::{spawn_heartbeat, HeartbeatMonitor, HeartbeatPhase, HeartbeatState};
use crate::core::listeners::ListenerId;
use crate::core::router::DispatchRouter;
use crate::core::sequence::SequenceTracker;
use crate::protocol::{CloseCode, Frame, Hello, Opcode, StatusUpdate};
use crate::traits::*;
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::User;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `close()` was called
    ClientClosed,
    /// No heartbeat ack within the deadline
    AckTimeout(Duration),
    /// Socket read failed or the stream ended
    ReadFailure(String),
    /// Heartbeat could not be written
    SendFailure(String),
    /// The server sent a close frame
    ServerClosed { reason: String },
    /// Server asked the client to reconnect (op 7)
    ReconnectRequested,
    /// Server invalidated the session (op 9)
    InvalidSession,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientClosed => write!(f, "closed by client"),
            DisconnectReason::AckTimeout(d) => write!(f, "heartbeat ack not received within {:?}", d),
            DisconnectReason::ReadFailure(e) => write!(f, "read failed: {}", e),
            DisconnectReason::SendFailure(e) => write!(f, "send failed: {}", e),
            DisconnectReason::ServerClosed { reason } if reason.is_empty() => write!(f, "closed by server"),
            DisconnectReason::ServerClosed { reason } => write!(f, "closed by server: {}", reason),
            DisconnectReason::ReconnectRequested => write!(f, "server requested reconnect"),
            DisconnectReason::InvalidSession => write!(f, "session invalidated by server"),
        }
    }
}

/// Terminal signal delivered to the owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: DisconnectReason,
    /// Close code sent or received, if a close frame was involved
    pub code: Option<CloseCode>,
}

impl Disconnect {
    pub fn new(reason: DisconnectReason, code: Option<CloseCode>) -> Self {
        Self { reason, code }
    }

    /// Map a heartbeat monitor failure to a disconnect
    fn from_heartbeat_error(error: GatewayError) -> Self {
        match error {
            GatewayError::AckTimeout(d) => {
                Self::new(DisconnectReason::AckTimeout(d), Some(CloseCode::SessionTimeout))
            }
            GatewayError::Send(e) => Self::new(DisconnectReason::SendFailure(e), None),
            other => Self::new(DisconnectReason::SendFailure(other.to_string()), None),
        }
    }

    /// Equivalent error, for callers that want to propagate with `?`
    pub fn into_error(self) -> GatewayError {
        match self.reason {
            DisconnectReason::AckTimeout(d) => GatewayError::AckTimeout(d),
            DisconnectReason::ReadFailure(e) => GatewayError::ReadFailure(e),
            DisconnectReason::SendFailure(e) => GatewayError::Send(e),
            _ => GatewayError::ConnectionClosed(self.to_string()),
        }
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} [{}]", self.reason, code),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Events delivered to the owner
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// HELLO received, background tasks running
    Connected,
    /// Identify completed
    Ready { session_id: String },
    /// Terminal; sent exactly once
    Disconnected(Disconnect),
    /// Non-fatal problem worth surfacing
    Error(String),
}

/// Identity established by a successful identify
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user: User,
}

/// Write half of the socket behind the single write lock
pub(crate) struct SocketWriter {
    inner: tokio::sync::Mutex<WsWriter>,
    metrics: Arc<AtomicMetrics>,
    close_timeout: Duration,
    close_sent: AtomicBool,
}

impl SocketWriter {
    fn new(write: WsWriter, metrics: Arc<AtomicMetrics>, close_timeout: Duration) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(write),
            metrics,
            close_timeout,
            close_sent: AtomicBool::new(false),
        }
    }

    /// Whether this side has started the close handshake
    fn close_sent(&self) -> bool {
        self.close_sent.load(Ordering::Acquire)
    }
}

#[async_trait]
impl FrameSink for SocketWriter {
    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let text = frame.to_text()?;
        let mut write = self.inner.lock().await;
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| GatewayError::Send(e.to_string()))?;
        self.metrics.increment_sent();
        debug!("Sent frame op {}", frame.opcode());
        Ok(())
    }

    async fn send_close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.close_sent.store(true, Ordering::Release);
        let frame = CloseFrame {
            code: WsCloseCode::from(code.code()),
            reason: reason.to_string().into(),
        };

        let write = async {
            let mut write = self.inner.lock().await;
            write.send(Message::Close(Some(frame))).await
        };

        match tokio::time::timeout(self.close_timeout, write).await {
            Ok(Ok(())) => {
                debug!("Sent close frame {}", code);
                Ok(())
            }
            Ok(Err(e)) => Err(GatewayError::Send(e.to_string())),
            Err(_) => Err(GatewayError::Send(format!(
                "close frame not written within {:?}",
                self.close_timeout
            ))),
        }
    }
}

/// State shared by the connection handle and its background tasks
pub(crate) struct Shared {
    pub(crate) state: AtomicConnectionState,
    pub(crate) metrics: Arc<AtomicMetrics>,
    pub(crate) cancel: CancellationToken,
    disconnect: watch::Sender<Option<Disconnect>>,
    events: Sender<ConnectionEvent>,
}

impl Shared {
    fn new(metrics: Arc<AtomicMetrics>, events: Sender<ConnectionEvent>) -> Self {
        let (disconnect, _) = watch::channel(None);
        Self {
            state: AtomicConnectionState::new(ConnectionState::Connecting),
            metrics,
            cancel: CancellationToken::new(),
            disconnect,
            events,
        }
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        // Receiver lives in the connection handle; gone means nobody is listening
        let _ = self.events.send(event);
    }

    /// End the connection; only the first reason is kept
    ///
    /// Returns whether this call recorded the reason.
    pub(crate) fn terminate(&self, disconnect: Disconnect) -> bool {
        let mut recorded = None;
        let first = self.disconnect.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(disconnect.clone());
            recorded = Some(disconnect.clone());
            true
        });

        if let Some(disconnect) = recorded {
            self.state.set(ConnectionState::Closed);
            match disconnect.reason {
                DisconnectReason::ClientClosed => info!("Connection closed: {}", disconnect),
                _ => warn!("Connection lost: {}", disconnect),
            }
            self.emit(ConnectionEvent::Disconnected(disconnect));
        }

        self.cancel.cancel();
        first
    }

    fn disconnect(&self) -> Option<Disconnect> {
        self.disconnect.borrow().clone()
    }

    /// Move a live connection to Closing; false if someone else got there first
    fn begin_closing(&self) -> bool {
        [ConnectionState::Connected, ConnectionState::Identified]
            .into_iter()
            .any(|from| self.state.compare_exchange(from, ConnectionState::Closing).is_ok())
    }
}

/// A live gateway connection
///
/// Created by [`GatewayConnection::connect`] (or the [`builder`](crate::builder)).
/// All methods take `&self`; share it behind an `Arc` to send from several tasks.
pub struct GatewayConnection {
    url: String,
    pub(crate) credentials: Credentials,
    pub(crate) config: GatewayConfig,
    pub(crate) writer: Arc<SocketWriter>,
    pub(crate) router: Arc<DispatchRouter>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) session: RwLock<Option<Session>>,
    pub(crate) identify_lock: tokio::sync::Mutex<()>,
    heartbeat: Arc<HeartbeatState>,
    interval: Duration,
    event_rx: Receiver<ConnectionEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GatewayConnection {
    /// Dial `endpoint`, complete the HELLO handshake and start the background tasks
    ///
    /// Returns once the connection accepts registrations and sends. Does not identify.
    pub async fn connect(endpoint: &str, credentials: Credentials, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let url = config.dial_url(endpoint);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| GatewayError::Dial(format!("invalid gateway url '{}': {}", url, e)))?;

        for (key, value) in credentials.get_headers().await {
            match key.parse::<http::header::HeaderName>() {
                Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                    Ok(header_value) => {
                        request.headers_mut().insert(header_name, header_value);
                    }
                    Err(_) => warn!("Invalid header value for key '{}'", key),
                },
                Err(_) => warn!("Invalid header name: {}", key),
            }
        }

        info!("Connecting to {}", url);
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| GatewayError::Dial(e.to_string()))?;
        let (write, mut read) = ws_stream.split();

        let hello = match tokio::time::timeout(config.hello_timeout, read_hello(&mut read)).await {
            Ok(hello) => hello?,
            Err(_) => {
                return Err(GatewayError::ReadFailure(format!(
                    "HELLO not received within {:?}",
                    config.hello_timeout
                )))
            }
        };
        let interval = Duration::from_millis(hello.heartbeat_interval as u64);
        if !hello.trace.is_empty() {
            debug!("HELLO trace: {:?}", hello.trace);
        }

        let metrics = Arc::new(AtomicMetrics::new());
        let (event_tx, event_rx) = unbounded();
        let shared = Arc::new(Shared::new(Arc::clone(&metrics), event_tx));
        let writer = Arc::new(SocketWriter::new(write, metrics, config.close_timeout));
        let sequence = Arc::new(SequenceTracker::new());
        let router = Arc::new(DispatchRouter::new(Arc::clone(&sequence)));

        let monitor = HeartbeatMonitor::new(
            Arc::clone(&writer),
            interval,
            config.ack_timeout_for(interval),
            Arc::clone(&sequence),
        );
        register_builtin_listeners(&router, &monitor, &writer, &shared);

        let (heartbeat_handle, heartbeat) = spawn_heartbeat(monitor, shared.cancel.clone());
        let heartbeat_task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                match heartbeat_handle.await {
                    Ok(Ok(())) => debug!("Heartbeat stopped"),
                    Ok(Err(e)) => {
                        shared.terminate(Disconnect::from_heartbeat_error(e));
                    }
                    Err(e) => {
                        error!("Heartbeat task failed: {}", e);
                        shared.terminate(Disconnect::new(DisconnectReason::SendFailure(e.to_string()), None));
                    }
                }
            })
        };

        let receive_task = tokio::spawn(receive_loop(
            read,
            Arc::clone(&router),
            Arc::clone(&writer),
            Arc::clone(&shared),
        ));

        shared.state.set(ConnectionState::Connected);
        shared.emit(ConnectionEvent::Connected);
        info!("Connected to gateway, heartbeat interval {:?}", interval);

        Ok(Self {
            url,
            credentials,
            config,
            writer,
            router,
            shared,
            session: RwLock::new(None),
            identify_lock: tokio::sync::Mutex::new(()),
            heartbeat,
            interval,
            event_rx,
            tasks: Mutex::new(vec![heartbeat_task, receive_task]),
        })
    }

    /// Send a frame through the serialized write path
    pub async fn send(&self, frame: &Frame) -> Result<()> {
        if self.shared.state.is_closed() {
            return Err(GatewayError::ConnectionClosed(self.closed_reason()));
        }
        self.writer.send_frame(frame).await
    }

    /// Update the bot's presence (op 3)
    pub async fn update_presence(&self, status: StatusUpdate) -> Result<()> {
        let frame = Frame::new(Opcode::STATUS_UPDATE, &status)?;
        self.send(&frame).await
    }

    pub fn router(&self) -> &Arc<DispatchRouter> {
        &self.router
    }

    pub fn register_opcode_listener<F>(&self, opcode: Opcode, listener: F) -> ListenerId
    where
        F: Fn(Arc<Frame>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.register_opcode_listener(opcode, listener)
    }

    pub fn register_event_listener<F>(&self, event_name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Arc<Frame>) -> Result<()> + Send + Sync + 'static,
    {
        self.router.register_event_listener(event_name, listener)
    }

    /// Dial URL including query parameters
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.session_id.clone())
    }

    /// Interval announced in HELLO
    pub fn heartbeat_interval(&self) -> Duration {
        self.interval
    }

    pub fn heartbeat_phase(&self) -> HeartbeatPhase {
        self.heartbeat.phase()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.heartbeat.latency()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.router.sequence().current()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_sent: self.shared.metrics.frames_sent(),
            frames_received: self.shared.metrics.frames_received(),
            heartbeats_sent: self.heartbeat.heartbeats_sent(),
            heartbeat_acks: self.heartbeat.acks_received(),
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ConnectionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ConnectionEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Why the connection ended, `None` while it is alive
    pub fn disconnect_reason(&self) -> Option<Disconnect> {
        self.shared.disconnect()
    }

    /// Wait until the connection ends for any reason
    pub async fn wait_closed(&self) -> Disconnect {
        let mut rx = self.shared.disconnect.subscribe();
        let closed = rx.wait_for(Option::is_some).await.ok().and_then(|d| (*d).clone());
        closed.unwrap_or_else(|| {
            Disconnect::new(
                DisconnectReason::ReadFailure("connection state dropped".to_string()),
                None,
            )
        })
    }

    /// Close with a normal close frame and wait for both background tasks
    ///
    /// Returns the terminal reason, which is `ClientClosed` unless the
    /// connection had already ended.
    pub async fn close(&self) -> Disconnect {
        if self.shared.begin_closing() {
            info!("Closing gateway connection");
            if let Err(e) = self.writer.send_close(CloseCode::Normal, "client closing").await {
                warn!("Failed to send close frame: {}", e);
            }
            self.shared
                .terminate(Disconnect::new(DisconnectReason::ClientClosed, Some(CloseCode::Normal)));
        } else {
            self.shared.cancel.cancel();
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        self.wait_closed().await
    }

    fn closed_reason(&self) -> String {
        self.shared
            .disconnect()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "connection is closing".to_string())
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("url", &self.url)
            .field("state", &self.state())
            .field("interval", &self.interval)
            .field("session_id", &self.session_id())
            .finish()
    }
}

/// Wire the listeners every connection needs
fn register_builtin_listeners(
    router: &DispatchRouter,
    monitor: &HeartbeatMonitor<SocketWriter>,
    writer: &Arc<SocketWriter>,
    shared: &Arc<Shared>,
) {
    let ack = monitor.ack_signal();
    router.register_opcode_listener(Opcode::HEARTBEAT_ACK, move |_| {
        ack.ack();
        Ok(())
    });

    // Server-requested heartbeat: answer at once, outside the regular cadence
    let reply_writer = Arc::clone(writer);
    let reply_ack = monitor.ack_signal();
    let sequence = Arc::clone(router.sequence());
    router.register_opcode_listener(Opcode::HEARTBEAT, move |_| {
        let frame = Frame::heartbeat(sequence.current())?;
        let writer = Arc::clone(&reply_writer);
        let ack = reply_ack.clone();
        ack.expect_requested_ack();
        tokio::spawn(async move {
            if let Err(e) = writer.send_frame(&frame).await {
                ack.cancel_requested_ack();
                warn!("Failed to answer heartbeat request: {}", e);
            }
        });
        Ok(())
    });

    // Resume is not supported, so both end the session with a normal close
    for (opcode, reason) in [
        (Opcode::RECONNECT, DisconnectReason::ReconnectRequested),
        (Opcode::INVALID_SESSION, DisconnectReason::InvalidSession),
    ] {
        let writer = Arc::clone(writer);
        let shared = Arc::clone(shared);
        router.register_opcode_listener(opcode, move |_| {
            let writer = Arc::clone(&writer);
            let shared = Arc::clone(&shared);
            let reason = reason.clone();
            tokio::spawn(async move {
                end_session(&writer, &shared, reason).await;
            });
            Ok(())
        });
    }
}

/// Close the socket normally and record `reason` as the terminal disconnect
async fn end_session(writer: &SocketWriter, shared: &Shared, reason: DisconnectReason) {
    if !shared.begin_closing() {
        return;
    }

    if let Err(e) = writer.send_close(CloseCode::Normal, "session ended by server").await {
        warn!("Failed to send close frame: {}", e);
    }
    shared.terminate(Disconnect::new(reason, Some(CloseCode::Normal)));
}

/// Read frames until the first one arrives and validate it as HELLO
async fn read_hello(read: &mut WsReader) -> Result<Hello> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return parse_hello(&Frame::from_text(&text)?),
            Some(Ok(Message::Binary(bytes))) => return parse_hello(&Frame::from_slice(&bytes)?),
            Some(Ok(Message::Close(frame))) => {
                let detail = frame
                    .map(|f| format!(" [{}]", CloseCode::from(u16::from(f.code))))
                    .unwrap_or_default();
                return Err(GatewayError::ConnectionClosed(format!(
                    "server closed before HELLO{}",
                    detail
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(GatewayError::ReadFailure(e.to_string())),
            None => return Err(GatewayError::ReadFailure("stream ended before HELLO".to_string())),
        }
    }
}

fn parse_hello(frame: &Frame) -> Result<Hello> {
    if frame.opcode() != Opcode::HELLO {
        return Err(GatewayError::HandshakeProtocolViolation {
            opcode: frame.opcode(),
        });
    }

    let hello: Hello = frame.decode()?;
    if hello.heartbeat_interval <= 0 {
        return Err(GatewayError::InvalidLivenessInterval(hello.heartbeat_interval));
    }
    Ok(hello)
}

/// The single read point of the socket
async fn receive_loop(
    mut read: WsReader,
    router: Arc<DispatchRouter>,
    writer: Arc<SocketWriter>,
    shared: Arc<Shared>,
) {
    loop {
        let message = tokio::select! {
            biased;

            _ = shared.cancel.cancelled() => {
                debug!("Receive loop cancelled");
                return;
            }

            message = read.next() => message,
        };

        let frame = match message {
            Some(Ok(Message::Text(text))) => Frame::from_text(&text),
            Some(Ok(Message::Binary(bytes))) => Frame::from_slice(&bytes),
            Some(Ok(Message::Close(frame))) => {
                if writer.close_sent() {
                    debug!("Close handshake completed");
                    return;
                }
                let (code, reason) = match frame {
                    Some(f) => (Some(CloseCode::from(u16::from(f.code))), f.reason.into_owned()),
                    None => (None, String::new()),
                };
                shared.terminate(Disconnect::new(DisconnectReason::ServerClosed { reason }, code));
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                if writer.close_sent() {
                    debug!("Read ended after close: {}", e);
                    return;
                }
                error!("WebSocket error: {}", e);
                shared.terminate(Disconnect::new(DisconnectReason::ReadFailure(e.to_string()), None));
                return;
            }
            None => {
                if !writer.close_sent() {
                    shared.terminate(Disconnect::new(
                        DisconnectReason::ReadFailure("stream ended".to_string()),
                        None,
                    ));
                }
                return;
            }
        };

        match frame {
            Ok(frame) => {
                shared.metrics.increment_received();
                debug!(
                    "Received op {} t={:?} s={:?}",
                    frame.opcode(),
                    frame.event_name(),
                    frame.sequence()
                );
                router.route(Arc::new(frame));
            }
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                shared.emit(ConnectionEvent::Error(e.to_string()));
            }
        }
    }
}
