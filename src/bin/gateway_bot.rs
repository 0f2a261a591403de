//! Gateway Bot Binary
//!
//! Connects to the gateway, identifies and logs guild and message events
//! until Ctrl+C or the connection ends.
//!
//! Usage:
//!   DISCORD_BOT_TOKEN=... ./gateway_bot
//!   BOT_CONFIG_PATH=config/bot.yaml ./gateway_bot

use anyhow::Result;
use discord_bot::app::GatewayBot;
use discord_bot::bin_common::{load_config_from_env, BinaryRunner, ConfigType, RunConfig};
use discord_bot::config::BotConfig;
use discord_bot::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config
    let config_path = load_config_from_env(ConfigType::Bot);
    let config = BotConfig::load(&config_path)?;

    // Initialize logging
    init_tracing(&config.log_level);
    config.log();

    let mut bot = GatewayBot::new(config).with_run_config(RunConfig::new("Gateway Bot"));
    bot.execute().await
}
