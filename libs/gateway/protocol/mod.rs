//! Wire protocol: opcodes, close codes, the frame envelope and typed payloads

pub mod close_code;
pub mod events;
pub mod frame;
pub mod opcode;
pub mod payloads;

pub use close_code::CloseCode;
pub use frame::Frame;
pub use opcode::Opcode;
pub use payloads::{ConnectionProperties, Hello, IdentifyPayload, ReadyEvent, Status, StatusUpdate};

/// Gateway protocol version requested in the dial URL
pub const GATEWAY_VERSION: u8 = 6;

/// Payload encoding requested in the dial URL
pub const GATEWAY_ENCODING: &str = "json";
