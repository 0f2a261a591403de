//! Heartbeat monitor for gateway connections
//!
//! # Architecture
//!
//! The monitor is a dedicated Tokio task bound to one connection:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Heartbeat Monitor           │
//! │                              │
//! │  AwaitingSend                │
//! │    read sequence number      │
//! │    send heartbeat ───────────┼──> FrameSink (write lock) ──> socket
//! │  AwaitingAck                 │
//! │    ack before deadline? ─────┼──< AckSignal <── HEARTBEAT_ACK listener
//! │      yes → Acked, sleep the  │
//! │            rest of interval  │
//! │      no  → TimedOut, close   │
//! │            4009, report      │
//! └──────────────────────────────┘
//! ```
//!
//! The ack deadline is an explicit margin (`GatewayConfig::heartbeat_ack_timeout`,
//! half the interval by default) rather than the whole interval, so a dead
//! connection is detected within the same cycle. Cadence stays at the interval
//! either way: after an ack the monitor sleeps `interval - elapsed`.
//!
//! Heartbeats the server asks for with op 1 are answered outside the cadence.
//! Their acks are counted off against [`AckSignal::expect_requested_ack`] and
//! never reach the monitor, so they cannot stand in for a missing regular ack.
//!
//! The monitor never terminates the process. A timeout returns
//! [`GatewayError::AckTimeout`] from [`HeartbeatMonitor::run`] and the owning
//! connection turns that into a disconnect.

use crate::core::sequence::SequenceTracker;
use crate::protocol::{CloseCode, Frame};
use crate::traits::{FrameSink, GatewayError, Result};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Heartbeat state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeartbeatPhase {
    AwaitingSend = 0,
    AwaitingAck = 1,
    Acked = 2,
    TimedOut = 3,
}

impl HeartbeatPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HeartbeatPhase::AwaitingSend,
            1 => HeartbeatPhase::AwaitingAck,
            2 => HeartbeatPhase::Acked,
            _ => HeartbeatPhase::TimedOut,
        }
    }
}

/// Observable heartbeat state
///
/// Timestamps are stored as milliseconds since an internal epoch, offset by
/// one so that `0` can mean "never".
pub struct HeartbeatState {
    epoch: Instant,
    last_sent_ms: AtomicU64,
    last_ack_ms: AtomicU64,
    beats: AtomicU64,
    acks: AtomicU64,
    phase: AtomicU8,
    requested: AtomicU32,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_sent_ms: AtomicU64::new(0),
            last_ack_ms: AtomicU64::new(0),
            beats: AtomicU64::new(0),
            acks: AtomicU64::new(0),
            phase: AtomicU8::new(HeartbeatPhase::AwaitingSend as u8),
            requested: AtomicU32::new(0),
        }
    }

    #[inline]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    pub fn record_sent(&self) {
        self.last_sent_ms.store(self.now_ms(), Ordering::Release);
        self.beats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ack(&self) {
        self.last_ack_ms.store(self.now_ms(), Ordering::Release);
        self.acks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn phase(&self) -> HeartbeatPhase {
        HeartbeatPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: HeartbeatPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Round trip of the last acknowledged heartbeat
    ///
    /// `None` before the first ack, or while the latest heartbeat is unacknowledged.
    pub fn latency(&self) -> Option<Duration> {
        let sent = self.last_sent_ms.load(Ordering::Acquire);
        let ack = self.last_ack_ms.load(Ordering::Acquire);
        if sent == 0 || ack < sent {
            return None;
        }
        Some(Duration::from_millis(ack - sent))
    }

    /// Server-requested heartbeats still waiting for their ack
    pub fn requested_outstanding(&self) -> u32 {
        self.requested.load(Ordering::Acquire)
    }

    fn take_requested(&self) -> bool {
        self.requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn acks_received(&self) -> u64 {
        self.acks.load(Ordering::Relaxed)
    }
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle used by the HEARTBEAT_ACK listener to wake the monitor
#[derive(Clone)]
pub struct AckSignal {
    tx: mpsc::UnboundedSender<()>,
    state: Arc<HeartbeatState>,
}

impl AckSignal {
    /// Deliver one HEARTBEAT_ACK
    ///
    /// Acks arrive in send order, so while a server-requested reply is
    /// outstanding one of them is consumed by it instead of the monitor.
    pub fn ack(&self) {
        if self.state.take_requested() {
            debug!("Ack counted against a server-requested heartbeat");
            return;
        }
        self.state.record_ack();
        // Receiver gone means the monitor already stopped
        let _ = self.tx.send(());
    }

    /// Register a heartbeat sent in reply to op 1
    pub fn expect_requested_ack(&self) {
        self.state.requested.fetch_add(1, Ordering::AcqRel);
    }

    /// Withdraw a reply registered with `expect_requested_ack` that was never written
    pub fn cancel_requested_ack(&self) {
        self.state.take_requested();
    }
}

/// Liveness task for one connection
pub struct HeartbeatMonitor<S: FrameSink> {
    sink: Arc<S>,
    interval: Duration,
    ack_timeout: Duration,
    sequence: Arc<SequenceTracker>,
    state: Arc<HeartbeatState>,
    ack_tx: mpsc::UnboundedSender<()>,
    ack_rx: mpsc::UnboundedReceiver<()>,
}

impl<S: FrameSink> HeartbeatMonitor<S> {
    pub fn new(
        sink: Arc<S>,
        interval: Duration,
        ack_timeout: Duration,
        sequence: Arc<SequenceTracker>,
    ) -> Self {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Self {
            sink,
            interval,
            ack_timeout: ack_timeout.min(interval),
            sequence,
            state: Arc::new(HeartbeatState::new()),
            ack_tx,
            ack_rx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    pub fn state(&self) -> Arc<HeartbeatState> {
        Arc::clone(&self.state)
    }

    pub fn ack_signal(&self) -> AckSignal {
        AckSignal {
            tx: self.ack_tx.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Run until cancelled or until the connection fails
    ///
    /// Returns `Ok(())` on cancellation, [`GatewayError::AckTimeout`] when an
    /// ack misses its deadline, or the sink's error when a send fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let HeartbeatMonitor {
            sink,
            interval,
            ack_timeout,
            sequence,
            state,
            ack_tx: _ack_tx,
            mut ack_rx,
        } = self;

        info!(
            "Starting heartbeat with interval {:?} (ack deadline {:?})",
            interval, ack_timeout
        );

        loop {
            if cancel.is_cancelled() {
                debug!("Heartbeat cancelled");
                return Ok(());
            }

            // Unsolicited acks that arrived while sleeping
            while ack_rx.try_recv().is_ok() {}

            state.set_phase(HeartbeatPhase::AwaitingSend);
            let seq = sequence.current();
            let frame = Frame::heartbeat(seq)?;
            sink.send_frame(&frame).await?;
            let sent_at = Instant::now();
            state.record_sent();
            state.set_phase(HeartbeatPhase::AwaitingAck);
            debug!(sequence = ?seq, "Heartbeat sent");

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Heartbeat cancelled while awaiting ack");
                    return Ok(());
                }

                ack = tokio::time::timeout(ack_timeout, ack_rx.recv()) => match ack {
                    Ok(Some(())) => {
                        state.set_phase(HeartbeatPhase::Acked);
                        let wait = interval.saturating_sub(sent_at.elapsed());
                        debug!("Heartbeat acked, next in {:?}", wait);

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                debug!("Heartbeat cancelled while sleeping");
                                return Ok(());
                            }
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                    Ok(None) => {
                        debug!("Ack channel closed, stopping heartbeat");
                        return Ok(());
                    }
                    Err(_) => {
                        state.set_phase(HeartbeatPhase::TimedOut);
                        warn!("Heartbeat ack not received within {:?}, closing session", ack_timeout);

                        if let Err(e) = sink
                            .send_close(CloseCode::SessionTimeout, "heartbeat ack timeout")
                            .await
                        {
                            warn!("Failed to send close frame after ack timeout: {}", e);
                        }

                        return Err(GatewayError::AckTimeout(ack_timeout));
                    }
                }
            }
        }
    }
}

/// Spawn a heartbeat monitor
///
/// Returns the task handle and the observable state.
pub fn spawn_heartbeat<S: FrameSink>(
    monitor: HeartbeatMonitor<S>,
    cancel: CancellationToken,
) -> (tokio::task::JoinHandle<Result<()>>, Arc<HeartbeatState>) {
    let state = monitor.state();
    let handle = tokio::spawn(monitor.run(cancel));
    (handle, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::router::DispatchRouter;
    use crate::protocol::{events, Opcode};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Sink that records writes and optionally acks every heartbeat
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Instant, Frame)>>,
        closes: Mutex<Vec<CloseCode>>,
        ack: Mutex<Option<AckSignal>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send_frame(&self, frame: &Frame) -> Result<()> {
            if self.fail_sends {
                return Err(GatewayError::Send("socket gone".to_string()));
            }
            self.sent.lock().push((Instant::now(), frame.clone()));
            if let Some(ack) = self.ack.lock().as_ref() {
                ack.ack();
            }
            Ok(())
        }

        async fn send_close(&self, code: CloseCode, _reason: &str) -> Result<()> {
            self.closes.lock().push(code);
            Ok(())
        }
    }

    fn sent_count(sink: &RecordingSink) -> usize {
        sink.sent.lock().len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_matches_interval_when_acked() {
        let interval = Duration::from_millis(45_000);
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            interval,
            interval / 2,
            Arc::new(SequenceTracker::new()),
        );
        *sink.ack.lock() = Some(monitor.ack_signal());

        let cancel = CancellationToken::new();
        let (handle, state) = spawn_heartbeat(monitor, cancel.clone());

        while sent_count(&sink) < 3 {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let sent = sink.sent.lock();
        for pair in sent.windows(2) {
            let spacing = pair[1].0 - pair[0].0;
            assert!(
                spacing >= interval && spacing < interval + Duration::from_millis(5),
                "heartbeat spacing {:?}",
                spacing
            );
        }
        assert!(sent.iter().all(|(_, f)| f.opcode() == Opcode::HEARTBEAT));
        assert!(sink.closes.lock().is_empty());
        assert!(state.acks_received() >= 3);
        assert!(state.latency().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ack_times_out_with_session_timeout() {
        let interval = Duration::from_millis(45_000);
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            interval,
            Duration::from_millis(10_000),
            Arc::new(SequenceTracker::new()),
        );
        let state = monitor.state();

        let started = Instant::now();
        let result = monitor.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(GatewayError::AckTimeout(d)) if d == Duration::from_millis(10_000)));
        assert!(started.elapsed() >= Duration::from_millis(10_000));
        assert!(started.elapsed() < Duration::from_millis(10_005));
        assert_eq!(sent_count(&sink), 1);
        assert_eq!(*sink.closes.lock(), vec![CloseCode::SessionTimeout]);
        assert_eq!(state.phase(), HeartbeatPhase::TimedOut);
        assert_eq!(state.latency(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_deadline_never_exceeds_interval() {
        let interval = Duration::from_millis(1_000);
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            interval,
            Duration::from_secs(60),
            Arc::new(SequenceTracker::new()),
        );
        assert_eq!(monitor.ack_timeout(), interval);

        let started = Instant::now();
        let result = monitor.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(GatewayError::AckTimeout(_))));
        assert!(started.elapsed() >= interval);
        assert!(started.elapsed() < interval + Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_reads_latest_sequence() {
        let interval = Duration::from_millis(1_000);
        let sink = Arc::new(RecordingSink::default());
        let sequence = Arc::new(SequenceTracker::new());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            interval,
            interval,
            Arc::clone(&sequence),
        );
        *sink.ack.lock() = Some(monitor.ack_signal());

        let cancel = CancellationToken::new();
        let (handle, _) = spawn_heartbeat(monitor, cancel.clone());

        while sent_count(&sink) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sequence.observe(41);
        while sent_count(&sink) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let sent = sink.sent.lock();
        assert_eq!(sent[0].1.sequence(), None);
        assert_eq!(sent[1].1.sequence(), Some(41));
        assert_eq!(sent[1].1.raw_payload(), "41");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_monitor_while_awaiting_ack() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            Duration::from_secs(45),
            Duration::from_secs(45),
            Arc::new(SequenceTracker::new()),
        );
        let cancel = CancellationToken::new();
        let (handle, state) = spawn_heartbeat(monitor, cancel.clone());

        while sent_count(&sink) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.phase(), HeartbeatPhase::AwaitingAck);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert!(sink.closes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_heartbeat_ack_does_not_satisfy_deadline() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            Duration::from_millis(1_000),
            Duration::from_millis(500),
            Arc::new(SequenceTracker::new()),
        );
        let signal = monitor.ack_signal();
        let state = monitor.state();
        let (handle, _) = spawn_heartbeat(monitor, CancellationToken::new());

        while sent_count(&sink) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Server asks for a heartbeat and acks only that one
        signal.expect_requested_ack();
        signal.ack();
        assert_eq!(state.requested_outstanding(), 0);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(GatewayError::AckTimeout(d)) if d == Duration::from_millis(500)));
        assert_eq!(*sink.closes.lock(), vec![CloseCode::SessionTimeout]);
        assert_eq!(state.acks_received(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_ack_still_counts_with_requested_reply_outstanding() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            Duration::from_millis(1_000),
            Duration::from_millis(500),
            Arc::new(SequenceTracker::new()),
        );
        let signal = monitor.ack_signal();
        let cancel = CancellationToken::new();
        let (handle, state) = spawn_heartbeat(monitor, cancel.clone());

        while sent_count(&sink) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        signal.expect_requested_ack();
        signal.ack();
        signal.ack();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(state.phase(), HeartbeatPhase::Acked);
        assert!(sink.closes.lock().is_empty());

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn test_cancelled_request_releases_slot() {
        let monitor = HeartbeatMonitor::new(
            Arc::new(RecordingSink::default()),
            Duration::from_secs(45),
            Duration::from_secs(10),
            Arc::new(SequenceTracker::new()),
        );
        let signal = monitor.ack_signal();
        signal.expect_requested_ack();
        signal.cancel_requested_ack();
        signal.cancel_requested_ack();
        assert_eq!(monitor.state().requested_outstanding(), 0);

        signal.ack();
        assert_eq!(monitor.state().acks_received(), 1);
    }

    /// Sink that records, next to each heartbeat, the highest sequence routed before it
    struct RoutedSink {
        routed: Arc<AtomicU64>,
        sent: Mutex<Vec<(u64, Option<u64>)>>,
        ack: Mutex<Option<AckSignal>>,
    }

    #[async_trait]
    impl FrameSink for RoutedSink {
        async fn send_frame(&self, frame: &Frame) -> Result<()> {
            let routed = self.routed.load(Ordering::SeqCst);
            self.sent.lock().push((routed, frame.sequence()));
            if let Some(ack) = self.ack.lock().as_ref() {
                ack.ack();
            }
            Ok(())
        }

        async fn send_close(&self, _code: CloseCode, _reason: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_never_lags_routed_dispatch() {
        let sequence = Arc::new(SequenceTracker::new());
        let router = DispatchRouter::new(Arc::clone(&sequence));
        let routed = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RoutedSink {
            routed: Arc::clone(&routed),
            sent: Mutex::new(Vec::new()),
            ack: Mutex::new(None),
        });
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&sink),
            Duration::from_millis(5),
            Duration::from_millis(5),
            Arc::clone(&sequence),
        );
        *sink.ack.lock() = Some(monitor.ack_signal());

        let cancel = CancellationToken::new();
        let (handle, _) = spawn_heartbeat(monitor, cancel.clone());

        for seq in 1..=60u64 {
            let frame = Frame::dispatch(events::MESSAGE_CREATE, seq, &serde_json::json!({})).unwrap();
            router.route(Arc::new(frame));
            routed.store(seq, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let sent = sink.sent.lock();
        assert!(sent.len() >= 10, "only {} heartbeats", sent.len());
        for (routed_before, carried) in sent.iter() {
            assert!(
                carried.unwrap_or(0) >= *routed_before,
                "heartbeat carried {:?} after routing {}",
                carried,
                routed_before
            );
        }
        assert_eq!(sequence.current(), Some(60));
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let sink = Arc::new(RecordingSink {
            fail_sends: true,
            ..Default::default()
        });
        let monitor = HeartbeatMonitor::new(
            sink,
            Duration::from_secs(45),
            Duration::from_secs(10),
            Arc::new(SequenceTracker::new()),
        );

        let result = monitor.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(GatewayError::Send(_))));
    }
}
