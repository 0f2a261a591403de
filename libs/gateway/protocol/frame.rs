use super::Opcode;
use crate::traits::{GatewayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Wire envelope: `{op, t?, d, s?}`; absent `t` and `s` are omitted on the wire
///
/// The payload is kept as undecoded JSON. Each consumer decodes it into its
/// own type with [`Frame::decode`], so one listener's decode failure never
/// affects another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "op")]
    opcode: Opcode,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    event_name: Option<String>,
    #[serde(rename = "d", default)]
    payload: Option<Box<RawValue>>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    sequence: Option<u64>,
}

impl Frame {
    /// Outbound frame with a typed payload
    pub fn new<T: Serialize + ?Sized>(opcode: Opcode, payload: &T) -> Result<Self> {
        let payload = serde_json::value::to_raw_value(payload)
            .map_err(|e| GatewayError::Decode(format!("failed to encode {} payload: {}", opcode, e)))?;

        Ok(Self {
            opcode,
            event_name: None,
            payload: Some(payload),
            sequence: None,
        })
    }

    /// Frame without payload (`d: null`)
    pub fn empty(opcode: Opcode) -> Self {
        Self {
            opcode,
            event_name: None,
            payload: None,
            sequence: None,
        }
    }

    /// Heartbeat carrying the last observed sequence number in both `s` and `d`
    pub fn heartbeat(sequence: Option<u64>) -> Result<Self> {
        let mut frame = Self::new(Opcode::HEARTBEAT, &sequence)?;
        frame.sequence = sequence;
        Ok(frame)
    }

    /// Dispatch frame, as the server would send it
    pub fn dispatch<T: Serialize + ?Sized>(
        event_name: impl Into<String>,
        sequence: u64,
        payload: &T,
    ) -> Result<Self> {
        let mut frame = Self::new(Opcode::DISPATCH, payload)?;
        frame.event_name = Some(event_name.into());
        frame.sequence = Some(sequence);
        Ok(frame)
    }

    /// Decode a text websocket message
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(format!("invalid frame: {}", e)))
    }

    /// Decode a binary websocket message holding uncompressed JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| GatewayError::Decode(format!("invalid frame: {}", e)))
    }

    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GatewayError::Decode(format!("failed to encode frame: {}", e)))
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[inline]
    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    #[inline]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Undecoded payload JSON (`"null"` when absent)
    pub fn raw_payload(&self) -> &str {
        self.payload.as_deref().map(RawValue::get).unwrap_or("null")
    }

    /// Decode the payload into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.raw_payload()).map_err(|e| {
            GatewayError::Decode(format!(
                "failed to decode {} payload{}: {}",
                self.opcode,
                self.event_name.as_deref().map(|t| format!(" for {}", t)).unwrap_or_default(),
                e
            ))
        })
    }
}
