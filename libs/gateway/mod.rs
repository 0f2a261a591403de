//! # Gateway
//!
//! Client for the Discord real-time gateway.
//!
//! ## Features
//!
//! - **Handshake**: dials the socket, reads HELLO and derives the heartbeat interval
//! - **Heartbeat monitor**: independent task with an explicit ack deadline
//! - **Dispatch routing**: opcode and event-name listeners, each invoked in its own task
//! - **Identify**: one-shot READY rendezvous with timeout and guaranteed deregistration
//! - **No process aborts**: fatal conditions close the connection and notify the owner

pub mod core;
pub mod protocol;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export protocol types
pub use protocol::{
    events, CloseCode, ConnectionProperties, Frame, Hello, IdentifyPayload, Opcode, ReadyEvent,
    Status, StatusUpdate,
};

// Re-export core client functionality
pub use self::core::{
    builder::{states, ConnectBuilder},
    config::GatewayConfig,
    connection::{ConnectionEvent, Disconnect, DisconnectReason, GatewayConnection, Session},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    heartbeat::{HeartbeatMonitor, HeartbeatPhase, HeartbeatState},
    listeners::{Listener, ListenerId},
    router::{DispatchRouter, EventListenerGuard},
    sequence::SequenceTracker,
};

/// Start building a gateway connection
pub use self::core::builder;

/// Type alias for Result with GatewayError
pub type Result<T> = std::result::Result<T, traits::GatewayError>;
