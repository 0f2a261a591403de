//! Typed payloads for the frames this client sends or consumes itself

use serde::{Deserialize, Serialize};
use types::{Channel, UnavailableGuild, User};

/// `d` of the HELLO frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Hello {
    /// Milliseconds; signed so a negative value is reported rather than rejected by serde
    pub heartbeat_interval: i64,
    #[serde(rename = "_trace", default)]
    pub trace: Vec<String>,
}

/// Client descriptor sent with identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "none".to_string(),
            device: "computer".to_string(),
        }
    }
}

/// Presence status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    Idle,
    Invisible,
    Offline,
}

/// `d` of a status update (op 3), also embedded in identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Unix time in milliseconds since the client went idle
    pub since: Option<u64>,
    pub status: Status,
    pub afk: bool,
}

impl StatusUpdate {
    pub fn new(status: Status) -> Self {
        Self {
            since: None,
            status,
            afk: false,
        }
    }
}

/// `d` of the IDENTIFY frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: ConnectionProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<StatusUpdate>,
}

/// `d` of the READY dispatch
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadyEvent {
    #[serde(alias = "v", default)]
    pub protocol_version: u8,
    pub user: User,
    #[serde(default)]
    pub private_channels: Vec<Channel>,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    #[serde(rename = "_trace", default)]
    pub trace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identify_omits_unset_options() {
        let payload = IdentifyPayload {
            token: "abc".to_string(),
            properties: ConnectionProperties {
                os: "linux".to_string(),
                browser: "none".to_string(),
                device: "computer".to_string(),
            },
            compress: Some(false),
            large_threshold: None,
            shard: None,
            presence: Some(StatusUpdate::new(Status::DoNotDisturb)),
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "token": "abc",
                "properties": {"os": "linux", "browser": "none", "device": "computer"},
                "compress": false,
                "presence": {"since": null, "status": "dnd", "afk": false}
            })
        );
    }

    #[test]
    fn test_ready_accepts_v_or_protocol_version() {
        let from_gateway: ReadyEvent = serde_json::from_value(json!({
            "v": 6,
            "user": {"id": "1", "username": "bot"},
            "private_channels": [],
            "guilds": [{"id": "9", "unavailable": true}],
            "session_id": "s1"
        }))
        .unwrap();
        assert_eq!(from_gateway.protocol_version, 6);
        assert_eq!(from_gateway.guilds.len(), 1);

        let spelled_out: ReadyEvent = serde_json::from_value(json!({
            "protocol_version": 6,
            "user": {"id": "1", "username": "bot"},
            "session_id": "s1",
            "_trace": ["gateway-prd-1"]
        }))
        .unwrap();
        assert_eq!(spelled_out.protocol_version, 6);
        assert_eq!(spelled_out.trace, vec!["gateway-prd-1".to_string()]);
    }

    #[test]
    fn test_hello_keeps_negative_interval() {
        let hello: Hello = serde_json::from_value(json!({"heartbeat_interval": -5})).unwrap();
        assert_eq!(hello.heartbeat_interval, -5);
    }
}
