//! Gateway smoke test
//!
//! Resolves the gateway endpoint and prints it. With `--connect` it also
//! completes the HELLO handshake, reports the heartbeat interval and closes.
//!
//! Usage:
//!   ./test_gateway
//!   ./test_gateway --connect

use anyhow::Result;
use discord_bot::app::GatewayBot;
use discord_bot::bin_common::{load_config_from_env, parse_args, ConfigType};
use discord_bot::config::BotConfig;
use discord_bot::logging::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = load_config_from_env(ConfigType::Bot);
    let config = BotConfig::load(&config_path)?;
    init_tracing(&config.log_level);

    let connect = parse_args().iter().any(|arg| arg == "--connect");
    let bot = GatewayBot::new(config);
    let rest = bot.rest_client()?;

    let endpoint = bot.resolve_endpoint(&rest).await?;
    info!("Gateway URL: {}", endpoint.url);
    info!("Recommended shards: {}", endpoint.shards);

    if connect {
        let connection = bot.connect(&rest).await?;
        info!("Heartbeat interval: {:?}", connection.heartbeat_interval());
        let disconnect = connection.close().await;
        info!("Closed: {}", disconnect);
    }

    Ok(())
}
