use crate::{Snowflake, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message body accepted by `POST /channels/{id}/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub tts: bool,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            nonce: None,
            tts: false,
        }
    }
}

/// Persisted message record returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub nonce: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_message_skips_missing_nonce() {
        let body = serde_json::to_value(OutgoingMessage::text("hi")).unwrap();
        assert_eq!(body, serde_json::json!({"content": "hi", "tts": false}));
    }

    #[test]
    fn test_decode_message() {
        let message: Message = serde_json::from_str(
            r#"{"id":"5","channel_id":"11","author":{"id":"42","username":"ferris"},
                "content":"hello","timestamp":"2019-01-01T00:00:00.000000+00:00","tts":false}"#,
        )
        .unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.author.username, "ferris");
    }
}
