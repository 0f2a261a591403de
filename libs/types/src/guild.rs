use crate::{Channel, Snowflake};
use serde::{Deserialize, Serialize};

/// Guild entry delivered in READY before the full GUILD_CREATE arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

// TODO: roles, emojis and members are not modelled yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub channels: Option<Vec<Channel>>,
}

impl Guild {
    /// Find a channel by name among the channels sent with GUILD_CREATE
    pub fn channel_named(&self, name: &str) -> Option<&Channel> {
        self.channels
            .as_deref()
            .and_then(|channels| channels.iter().find(|c| c.has_name(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_named() {
        let guild: Guild = serde_json::from_str(
            r#"{"id":"1","name":"crab pit","channels":[
                {"id":"10","type":2,"name":"voice"},
                {"id":"11","type":0,"name":"general"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(guild.channel_named("general").map(|c| c.id.as_str()), Some("11"));
        assert!(guild.channel_named("missing").is_none());
    }

    #[test]
    fn test_guild_without_channels() {
        let guild: Guild = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(guild.channel_named("general").is_none());
    }
}
