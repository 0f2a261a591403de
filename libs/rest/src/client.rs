use crate::error::{RestError, Result};
use gateway::Credentials;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use types::{Message, OutgoingMessage};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api";

/// API version matching the gateway protocol version
pub const DEFAULT_API_VERSION: u8 = 6;

/// `GET /gateway/bot` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
    /// Recommended shard count
    #[serde(default = "default_shards")]
    pub shards: u32,
}

fn default_shards() -> u32 {
    1
}

/// `GET /gateway` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayUrl {
    pub url: String,
}

/// Discord REST API client
pub struct RestClient {
    base_url: String,
    api_version: u8,
    credentials: Credentials,
    client: Client,
}

impl RestClient {
    /// Create a client for the public API
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL, DEFAULT_API_VERSION)
    }

    /// Create a client with a custom base URL (mock servers, proxies)
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>, api_version: u8) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version,
            credentials,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v{}{}", self.base_url, self.api_version, path)
    }

    /// Resolve the gateway URL and recommended shard count
    pub async fn get_gateway_bot(&self) -> Result<GatewayInfo> {
        let url = self.endpoint("/gateway/bot");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.credentials.authorization())
            .header(USER_AGENT, self.credentials.user_agent())
            .send()
            .await?;

        let info: GatewayInfo = parse_response(response).await?;
        info!("Gateway resolved to {} ({} shards)", info.url, info.shards);
        Ok(info)
    }

    /// Resolve the gateway URL without authenticating
    pub async fn get_gateway(&self) -> Result<GatewayUrl> {
        let url = self.endpoint("/gateway");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, self.credentials.user_agent())
            .send()
            .await?;

        parse_response(response).await
    }

    /// Post a message to a channel and return the persisted record
    pub async fn send_message(&self, channel_id: &str, message: &OutgoingMessage) -> Result<Message> {
        let url = self.endpoint(&format!("/channels/{}/messages", channel_id));
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.credentials.authorization())
            .header(USER_AGENT, self.credentials.user_agent())
            .json(message)
            .send()
            .await?;

        let sent: Message = parse_response(response).await?;
        debug!("Message {} sent to channel {}", sent.id, sent.channel_id);
        Ok(sent)
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limit exceeded");
        return Err(RestError::RateLimitExceeded);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(RestError::Unauthorized);
    }

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(RestError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| RestError::DeserializeFailed(e.to_string()))
}
