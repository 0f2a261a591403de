use crate::protocol::{ConnectionProperties, GATEWAY_ENCODING, GATEWAY_VERSION};
use crate::traits::{GatewayError, Result};
use std::time::Duration;

/// Runtime configuration for a gateway connection
///
/// Defaults match the live gateway. Tests shrink the timeouts.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Protocol version appended to the dial URL as `v`
    pub version: u8,

    /// Payload encoding appended to the dial URL
    pub encoding: String,

    /// How long `connect` waits for HELLO after the socket is open
    pub hello_timeout: Duration,

    /// How long `identify` waits for READY
    pub identify_timeout: Duration,

    /// Ack deadline after each heartbeat send
    ///
    /// `None` uses half the heartbeat interval. Always clamped to the interval.
    pub heartbeat_ack_timeout: Option<Duration>,

    /// Upper bound for writing a close frame before giving up
    pub close_timeout: Duration,

    /// Identify: member count above which offline members are omitted
    pub large_threshold: Option<u32>,

    /// Identify: `[shard_id, shard_count]`
    pub shard: Option<[u32; 2]>,

    /// Identify: client descriptor
    pub properties: ConnectionProperties,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: GATEWAY_VERSION,
            encoding: GATEWAY_ENCODING.to_string(),
            hello_timeout: Duration::from_secs(30),
            identify_timeout: Duration::from_secs(30),
            heartbeat_ack_timeout: None,
            close_timeout: Duration::from_secs(5),
            large_threshold: None,
            shard: None,
            properties: ConnectionProperties::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.encoding != GATEWAY_ENCODING {
            return Err(GatewayError::Configuration(format!(
                "unsupported encoding '{}', only '{}' is implemented",
                self.encoding, GATEWAY_ENCODING
            )));
        }

        if self.hello_timeout.is_zero() || self.identify_timeout.is_zero() {
            return Err(GatewayError::Configuration(
                "hello_timeout and identify_timeout must be greater than 0".to_string(),
            ));
        }

        if matches!(self.heartbeat_ack_timeout, Some(t) if t.is_zero()) {
            return Err(GatewayError::Configuration(
                "heartbeat_ack_timeout must be greater than 0".to_string(),
            ));
        }

        if let Some([id, count]) = self.shard {
            if count == 0 || id >= count {
                return Err(GatewayError::Configuration(format!(
                    "invalid shard [{}, {}]",
                    id, count
                )));
            }
        }

        if let Some(threshold) = self.large_threshold {
            if !(50..=250).contains(&threshold) {
                return Err(GatewayError::Configuration(
                    "large_threshold must be between 50 and 250".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Ack deadline to use for a given heartbeat interval
    pub fn ack_timeout_for(&self, interval: Duration) -> Duration {
        self.heartbeat_ack_timeout
            .unwrap_or(interval / 2)
            .min(interval)
    }

    /// Dial URL with protocol version and encoding query parameters
    pub fn dial_url(&self, endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        let query = format!("v={}&encoding={}", self.version, self.encoding);
        if base.contains('?') {
            format!("{}&{}", base, query)
        } else {
            format!("{}/?{}", base, query)
        }
    }
}
