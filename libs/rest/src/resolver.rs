use crate::client::{GatewayInfo, RestClient};
use crate::error::Result;
use async_trait::async_trait;

/// Source of the gateway endpoint to dial
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self) -> Result<GatewayInfo>;
}

#[async_trait]
impl EndpointResolver for RestClient {
    async fn resolve(&self) -> Result<GatewayInfo> {
        self.get_gateway_bot().await
    }
}

/// Fixed endpoint, for local gateways and tests
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub GatewayInfo);

impl StaticEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(GatewayInfo {
            url: url.into(),
            shards: 1,
        })
    }
}

#[async_trait]
impl EndpointResolver for StaticEndpoint {
    async fn resolve(&self) -> Result<GatewayInfo> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_endpoint_resolves_to_itself() {
        let resolver: Box<dyn EndpointResolver> = Box::new(StaticEndpoint::new("ws://127.0.0.1:9000"));
        let info = resolver.resolve().await.unwrap();
        assert_eq!(info.url, "ws://127.0.0.1:9000");
        assert_eq!(info.shards, 1);
    }
}
