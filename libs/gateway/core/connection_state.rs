//! Lock-free connection state and counters

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle of a gateway connection
///
/// A connection only moves forward: `Connecting → Connected → Identified`,
/// and from any of those to `Closing → Closed`. Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Socket dialed, waiting for HELLO
    Connecting = 0,
    /// HELLO received, heartbeat and receive loop running
    Connected = 1,
    /// READY received, session id assigned
    Identified = 2,
    /// Teardown in progress
    Closing = 3,
    /// Terminal
    Closed = 4,
}

impl ConnectionState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Connected,
            2 => ConnectionState::Identified,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Transition only if the current state is `current`
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    /// Socket is usable (connected or identified)
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self.get(), ConnectionState::Connected | ConnectionState::Identified)
    }

    /// Closing or closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self.get(), ConnectionState::Closing | ConnectionState::Closed)
    }
}

/// Snapshot of connection counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub heartbeats_sent: u64,
    pub heartbeat_acks: u64,
}

/// Atomic frame counters
///
/// Heartbeat counters live in `HeartbeatState`; the connection merges both
/// into a [`Metrics`] snapshot.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lifecycle() {
        let state = AtomicConnectionState::new(ConnectionState::Connecting);
        assert!(!state.is_connected());

        state.set(ConnectionState::Connected);
        assert!(state.is_connected());

        state.set(ConnectionState::Identified);
        assert!(state.is_connected());
        assert_eq!(state.get(), ConnectionState::Identified);

        state.set(ConnectionState::Closed);
        assert!(state.is_closed());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_compare_exchange_single_winner() {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connected));
        let winners = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let state = Arc::clone(&state);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if state
                        .compare_exchange(ConnectionState::Connected, ConnectionState::Closing)
                        .is_ok()
                    {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::Relaxed), 1, "Only one thread should win the race");
        assert_eq!(state.get(), ConnectionState::Closing);
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = Arc::new(AtomicMetrics::new());

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_sent();
                        metrics.increment_received();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.frames_sent(), 5000);
        assert_eq!(metrics.frames_received(), 5000);
    }
}
