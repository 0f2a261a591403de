//! Bot configuration
//!
//! Loaded from YAML. The token never lives in the file: it comes from
//! `DISCORD_BOT_TOKEN` (a `.env` file is honoured).

use gateway::{ConnectionProperties, Credentials, GatewayConfig, Status, StatusUpdate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable holding the bot token
pub const TOKEN_ENV_VAR: &str = "DISCORD_BOT_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub gateway: GatewaySection,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Presence sent with identify
    #[serde(default = "default_status")]
    pub status: Status,

    /// Message posted once per guild on GUILD_CREATE
    #[serde(default)]
    pub greeting: Option<GreetingConfig>,

    /// Bot token from .env (not in YAML)
    #[serde(skip)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: u8,
    /// Skip `GET /gateway/bot` and dial this URL directly
    #[serde(default)]
    pub gateway_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_api_version(),
            gateway_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewaySection {
    #[serde(default)]
    pub hello_timeout_secs: Option<u64>,
    #[serde(default)]
    pub identify_timeout_secs: Option<u64>,
    #[serde(default)]
    pub heartbeat_ack_timeout_ms: Option<u64>,
    #[serde(default)]
    pub large_threshold: Option<u32>,
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingConfig {
    pub channel_name: String,
    pub content: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_status() -> Status {
    Status::Online
}

fn default_base_url() -> String {
    rest::DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> u8 {
    rest::DEFAULT_API_VERSION
}

impl BotConfig {
    /// Load configuration from a YAML file and the environment
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse YAML and pull the token from the environment
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let mut config: BotConfig = serde_yaml::from_str(yaml_content)?;

        dotenv::dotenv().ok();
        config.token = std::env::var(TOKEN_ENV_VAR)
            .map_err(|_| ConfigError::EnvVarMissing(TOKEN_ENV_VAR.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} must not be empty",
                TOKEN_ENV_VAR
            )));
        }

        if self.api.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url must not be empty".to_string(),
            ));
        }

        if let Some(greeting) = &self.greeting {
            if greeting.channel_name.is_empty() || greeting.content.is_empty() {
                return Err(ConfigError::ValidationError(
                    "greeting needs both channel_name and content".to_string(),
                ));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        self.gateway_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Credentials for both the gateway and REST clients
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::bot(self.token.clone());
        match &self.gateway.user_agent {
            Some(user_agent) => credentials.with_user_agent(user_agent.clone()),
            None => credentials,
        }
    }

    /// Gateway runtime configuration with the YAML overrides applied
    pub fn gateway_config(&self) -> GatewayConfig {
        let section = &self.gateway;
        let mut config = GatewayConfig {
            heartbeat_ack_timeout: section.heartbeat_ack_timeout_ms.map(Duration::from_millis),
            large_threshold: section.large_threshold,
            shard: section.shard,
            properties: ConnectionProperties::default(),
            ..GatewayConfig::default()
        };
        if let Some(secs) = section.hello_timeout_secs {
            config.hello_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = section.identify_timeout_secs {
            config.identify_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn presence(&self) -> StatusUpdate {
        StatusUpdate::new(self.status)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API: {} (v{})", self.api.base_url, self.api.version);
        if let Some(url) = &self.api.gateway_url {
            info!("  Gateway override: {}", url);
        }
        info!("  Status: {:?}", self.status);
        info!("  Log level: {}", self.log_level);
        if let Some(greeting) = &self.greeting {
            info!("  Greeting channel: #{}", greeting.channel_name);
        }
    }
}
