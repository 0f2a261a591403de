pub mod states;

use crate::core::config::GatewayConfig;
use crate::core::connection::GatewayConnection;
use crate::protocol::ConnectionProperties;
use crate::traits::*;
use states::*;
use std::time::Duration;

/// Type-state builder for [`GatewayConnection`]
///
/// The endpoint and credentials are required; everything else falls back to
/// [`GatewayConfig::default`]. `connect()` exists only once both are set.
pub struct ConnectBuilder<E, C>
where
    E: EndpointStage,
    C: CredentialsStage,
{
    endpoint: E,
    credentials: C,
    config: GatewayConfig,
}

impl ConnectBuilder<NoEndpoint, NoCredentials> {
    pub fn new() -> Self {
        Self {
            endpoint: NoEndpoint,
            credentials: NoCredentials,
            config: GatewayConfig::default(),
        }
    }
}

impl Default for ConnectBuilder<NoEndpoint, NoCredentials> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ConnectBuilder<NoEndpoint, C>
where
    C: CredentialsStage,
{
    /// Gateway endpoint, usually from `GET /gateway/bot`
    pub fn url(self, url: impl Into<String>) -> ConnectBuilder<Endpoint, C> {
        ConnectBuilder {
            endpoint: Endpoint(url.into()),
            credentials: self.credentials,
            config: self.config,
        }
    }
}

impl<E> ConnectBuilder<E, NoCredentials>
where
    E: EndpointStage,
{
    pub fn credentials(self, credentials: Credentials) -> ConnectBuilder<E, WithCredentials> {
        ConnectBuilder {
            endpoint: self.endpoint,
            credentials: WithCredentials(credentials),
            config: self.config,
        }
    }

    /// Shorthand for `credentials(Credentials::bot(token))`
    pub fn bot_token(self, token: impl Into<String>) -> ConnectBuilder<E, WithCredentials> {
        self.credentials(Credentials::bot(token))
    }
}

// Optional settings, available in any state
impl<E, C> ConnectBuilder<E, C>
where
    E: EndpointStage,
    C: CredentialsStage,
{
    /// Replace the whole configuration
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn hello_timeout(mut self, timeout: Duration) -> Self {
        self.config.hello_timeout = timeout;
        self
    }

    pub fn identify_timeout(mut self, timeout: Duration) -> Self {
        self.config.identify_timeout = timeout;
        self
    }

    /// Ack deadline after each heartbeat (clamped to the interval)
    pub fn heartbeat_ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.heartbeat_ack_timeout = Some(timeout);
        self
    }

    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.config.large_threshold = Some(threshold);
        self
    }

    pub fn shard(mut self, shard_id: u32, shard_count: u32) -> Self {
        self.config.shard = Some([shard_id, shard_count]);
        self
    }

    pub fn properties(mut self, properties: ConnectionProperties) -> Self {
        self.config.properties = properties;
        self
    }
}

impl ConnectBuilder<Endpoint, WithCredentials> {
    /// Dial and complete the HELLO handshake
    pub async fn connect(self) -> Result<GatewayConnection> {
        let Endpoint(url) = self.endpoint;
        let WithCredentials(credentials) = self.credentials;
        GatewayConnection::connect(&url, credentials, self.config).await
    }
}
