//! Outbound write seam
//!
//! Everything that writes to the gateway goes through a `FrameSink`. The
//! connection's implementation holds the single write lock, so any number of
//! callers may share one sink without ever writing concurrently.

use crate::traits::error::Result;
use crate::protocol::{CloseCode, Frame};
use async_trait::async_trait;

#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Serialize and write one frame
    async fn send_frame(&self, frame: &Frame) -> Result<()>;

    /// Write a close control frame with the given gateway close code
    async fn send_close(&self, code: CloseCode, reason: &str) -> Result<()>;
}
