use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the gateway upgrade request
pub type Headers = HashMap<String, String>;

/// Default user agent sent on the upgrade request and REST calls
pub const DEFAULT_USER_AGENT: &str =
    concat!("DiscordBot (https://github.com/yourusername/discord-bot, ", env!("CARGO_PKG_VERSION"), ")");

/// Trait for providing HTTP headers for the upgrade request
///
/// Called once per dial, so implementations may mint fresh values.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers to send with the upgrade request
    async fn get_headers(&self) -> Headers;
}

/// Credentials used both for the upgrade headers and the identify payload
#[derive(Clone)]
pub struct Credentials {
    token: String,
    user_agent: String,
}

impl Credentials {
    /// Bot token credentials
    pub fn bot(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Raw token as sent in the identify payload
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[async_trait]
impl HeaderProvider for Credentials {
    async fn get_headers(&self) -> Headers {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), self.authorization());
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_credentials_headers() {
        let credentials = Credentials::bot("abc").with_user_agent("test-agent");
        let headers = credentials.get_headers().await;

        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bot abc"));
        assert_eq!(headers.get("User-Agent").map(String::as_str), Some("test-agent"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", Credentials::bot("super-secret").with_user_agent("agent/1"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("agent/1"));
    }
}
