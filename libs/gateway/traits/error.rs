use crate::protocol::Opcode;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Could not dial the gateway socket
    #[error("Failed to dial gateway: {0}")]
    Dial(String),

    /// First frame after dial was not HELLO
    #[error("Handshake protocol violation: expected HELLO, got opcode {opcode}")]
    HandshakeProtocolViolation { opcode: Opcode },

    /// HELLO carried a non-positive heartbeat interval
    #[error("Invalid heartbeat interval in HELLO: {0}ms")]
    InvalidLivenessInterval(i64),

    /// Writing a frame to the socket failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Reading from the socket failed
    #[error("Read failed: {0}")]
    ReadFailure(String),

    /// No heartbeat ack within the ack deadline
    #[error("Heartbeat ack not received within {0:?}")]
    AckTimeout(Duration),

    /// READY did not arrive in time
    #[error("READY not received within {0:?} of identify")]
    IdentifyTimeout(Duration),

    /// READY arrived but its payload could not be decoded
    #[error("Failed to decode READY: {0}")]
    IdentifyDecodeFailure(String),

    /// Frame or payload decode error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation attempted on a closed connection
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Identify called on a connection that already has a session
    #[error("Connection already identified as session {0}")]
    AlreadyIdentified(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
