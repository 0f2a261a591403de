//! Passive Discord records shared by the gateway and REST crates.
//!
//! These are plain data-transfer objects. Fields the API may omit are
//! `Option`s or carry `#[serde(default)]` so partial objects still decode.

pub mod channel;
pub mod guild;
pub mod message;
pub mod user;

pub use channel::{Channel, ChannelType, Overwrite};
pub use guild::{Guild, UnavailableGuild};
pub use message::{Message, OutgoingMessage};
pub use user::User;

/// Discord snowflake identifiers are transported as strings
pub type Snowflake = String;
