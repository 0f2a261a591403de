use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway opcode
///
/// A newtype rather than an enum: the gateway may introduce opcodes this
/// client does not know, and those frames still have to reach opcode
/// listeners instead of failing to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Receive: dispatches a named event
    pub const DISPATCH: Opcode = Opcode(0);
    /// Send/Receive: liveness ping
    pub const HEARTBEAT: Opcode = Opcode(1);
    /// Send: client handshake
    pub const IDENTIFY: Opcode = Opcode(2);
    /// Send: update the client presence
    pub const STATUS_UPDATE: Opcode = Opcode(3);
    /// Send: join/move/leave voice channels
    pub const VOICE_STATE_UPDATE: Opcode = Opcode(4);
    /// Send: voice ping checking
    pub const VOICE_SERVER_PING: Opcode = Opcode(5);
    /// Send: resume a closed connection
    pub const RESUME: Opcode = Opcode(6);
    /// Receive: server asks the client to reconnect
    pub const RECONNECT: Opcode = Opcode(7);
    /// Send: request guild members
    pub const REQUEST_GUILD_MEMBERS: Opcode = Opcode(8);
    /// Receive: the session is invalid
    pub const INVALID_SESSION: Opcode = Opcode(9);
    /// Receive: first frame after connecting, carries the heartbeat interval
    pub const HELLO: Opcode = Opcode(10);
    /// Receive: acknowledges a client heartbeat
    pub const HEARTBEAT_ACK: Opcode = Opcode(11);

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Protocol name, or `None` for opcodes this client does not know
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Opcode::DISPATCH => "DISPATCH",
            Opcode::HEARTBEAT => "HEARTBEAT",
            Opcode::IDENTIFY => "IDENTIFY",
            Opcode::STATUS_UPDATE => "STATUS_UPDATE",
            Opcode::VOICE_STATE_UPDATE => "VOICE_STATE_UPDATE",
            Opcode::VOICE_SERVER_PING => "VOICE_SERVER_PING",
            Opcode::RESUME => "RESUME",
            Opcode::RECONNECT => "RECONNECT",
            Opcode::REQUEST_GUILD_MEMBERS => "REQUEST_GUILD_MEMBERS",
            Opcode::INVALID_SESSION => "INVALID_SESSION",
            Opcode::HELLO => "HELLO",
            Opcode::HEARTBEAT_ACK => "HEARTBEAT_ACK",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{} (unknown)", self.0),
        }
    }
}

impl From<u16> for Opcode {
    fn from(value: u16) -> Self {
        Opcode(value)
    }
}
