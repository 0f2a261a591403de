use std::fmt;

/// Gateway close codes
///
/// Codes 1000..=1015 are standard websocket codes; the 4000 range is
/// defined by the gateway. 4006 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Normal closure (1000), used for caller-initiated close
    Normal,
    UnknownError,
    UnknownOpcode,
    DecodeError,
    NotAuthenticated,
    AuthenticationFailed,
    AlreadyAuthenticated,
    InvalidSeq,
    RateLimited,
    SessionTimeout,
    InvalidShard,
    ShardingRequired,
    /// Any other code received from the server
    Other(u16),
}

impl CloseCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            4000 => CloseCode::UnknownError,
            4001 => CloseCode::UnknownOpcode,
            4002 => CloseCode::DecodeError,
            4003 => CloseCode::NotAuthenticated,
            4004 => CloseCode::AuthenticationFailed,
            4005 => CloseCode::AlreadyAuthenticated,
            4007 => CloseCode::InvalidSeq,
            4008 => CloseCode::RateLimited,
            4009 => CloseCode::SessionTimeout,
            4010 => CloseCode::InvalidShard,
            4011 => CloseCode::ShardingRequired,
            other => CloseCode::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::UnknownError => 4000,
            CloseCode::UnknownOpcode => 4001,
            CloseCode::DecodeError => 4002,
            CloseCode::NotAuthenticated => 4003,
            CloseCode::AuthenticationFailed => 4004,
            CloseCode::AlreadyAuthenticated => 4005,
            CloseCode::InvalidSeq => 4007,
            CloseCode::RateLimited => 4008,
            CloseCode::SessionTimeout => 4009,
            CloseCode::InvalidShard => 4010,
            CloseCode::ShardingRequired => 4011,
            CloseCode::Other(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CloseCode::Normal => "normal closure",
            CloseCode::UnknownError => "unknown error",
            CloseCode::UnknownOpcode => "invalid opcode or payload for an opcode",
            CloseCode::DecodeError => "invalid payload",
            CloseCode::NotAuthenticated => "payload sent before identifying",
            CloseCode::AuthenticationFailed => "identify token is incorrect",
            CloseCode::AlreadyAuthenticated => "more than one identify payload sent",
            CloseCode::InvalidSeq => "invalid sequence when resuming",
            CloseCode::RateLimited => "payloads sent too quickly",
            CloseCode::SessionTimeout => "session timed out",
            CloseCode::InvalidShard => "invalid shard sent when identifying",
            CloseCode::ShardingRequired => "too many guilds, sharding required",
            CloseCode::Other(_) => "unrecognised close code",
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_code(code)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_range_maps_both_ways() {
        for code in (4000..=4011).filter(|c| *c != 4006) {
            let close = CloseCode::from_code(code);
            assert!(!matches!(close, CloseCode::Other(_)), "{} should be known", code);
            assert_eq!(close.code(), code);
        }
        assert_eq!(CloseCode::from_code(4006), CloseCode::Other(4006));
    }

    #[test]
    fn test_session_timeout_display() {
        assert_eq!(CloseCode::SessionTimeout.to_string(), "4009 (session timed out)");
    }
}
