//! # Gateway Traits
//!
//! Seams and shared types used throughout the gateway crate:
//!
//! - **GatewayError**: every failure the gateway can report
//! - **HeaderProvider**: headers for the upgrade request (implemented by `Credentials`)
//! - **FrameSink**: serialized outbound write path

pub mod error;
pub mod headers;
pub mod sink;

// Re-export commonly used types
pub use error::{GatewayError, Result};
pub use headers::{Credentials, HeaderProvider, Headers, DEFAULT_USER_AGENT};
pub use sink::FrameSink;
