//! Dispatch event names (`t` of op 0 frames)

pub const READY: &str = "READY";
pub const RESUMED: &str = "RESUMED";
pub const GUILD_CREATE: &str = "GUILD_CREATE";
pub const GUILD_UPDATE: &str = "GUILD_UPDATE";
pub const GUILD_DELETE: &str = "GUILD_DELETE";
pub const CHANNEL_CREATE: &str = "CHANNEL_CREATE";
pub const CHANNEL_UPDATE: &str = "CHANNEL_UPDATE";
pub const CHANNEL_DELETE: &str = "CHANNEL_DELETE";
pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
pub const MESSAGE_UPDATE: &str = "MESSAGE_UPDATE";
pub const MESSAGE_DELETE: &str = "MESSAGE_DELETE";
pub const PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";
pub const TYPING_START: &str = "TYPING_START";
