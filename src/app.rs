//! Gateway bot application
//!
//! Resolves the gateway endpoint, connects, identifies with the configured
//! presence and logs guild and message traffic until Ctrl+C or disconnect.
//! When a greeting is configured it is posted once per guild to the first
//! channel with the configured name.

use crate::bin_common::{BinaryRunner, RunConfig};
use crate::config::{BotConfig, GreetingConfig};
use anyhow::Result;
use gateway::{events, ConnectionEvent, Disconnect, GatewayConnection};
use parking_lot::Mutex;
use rest::{EndpointResolver, GatewayInfo, RestClient, StaticEndpoint};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use types::{Guild, Message, OutgoingMessage};

pub struct GatewayBot {
    config: BotConfig,
    run: RunConfig,
    final_stats: Option<String>,
}

impl GatewayBot {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            run: RunConfig::new("gateway_bot"),
            final_stats: None,
        }
    }

    pub fn with_run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    /// REST client for the configured API base and version
    pub fn rest_client(&self) -> rest::Result<RestClient> {
        RestClient::with_base_url(
            self.config.credentials(),
            self.config.api.base_url.clone(),
            self.config.api.version,
        )
    }

    /// Gateway endpoint: the configured override, or `GET /gateway/bot`
    pub async fn resolve_endpoint(&self, rest: &RestClient) -> rest::Result<GatewayInfo> {
        let fixed = self.config.api.gateway_url.clone().map(StaticEndpoint::new);
        let resolver: &dyn EndpointResolver = match &fixed {
            Some(endpoint) => endpoint,
            None => rest,
        };
        resolver.resolve().await
    }

    /// Resolve, dial and complete the HELLO handshake
    pub async fn connect(&self, rest: &RestClient) -> Result<GatewayConnection> {
        let info = self.resolve_endpoint(rest).await?;
        if info.shards > 1 && self.config.gateway.shard.is_none() {
            warn!(
                "Gateway recommends {} shards, connecting unsharded",
                info.shards
            );
        }

        let connection = gateway::builder()
            .url(info.url)
            .credentials(self.config.credentials())
            .config(self.config.gateway_config())
            .connect()
            .await?;

        info!(
            "Connected to {} (heartbeat every {:?})",
            connection.url(),
            connection.heartbeat_interval()
        );
        Ok(connection)
    }

    fn register_listeners(&self, connection: &GatewayConnection, rest: Arc<RestClient>) {
        let greeting = self.config.greeting.clone();
        let greeted = Arc::new(Mutex::new(HashSet::new()));

        connection.register_event_listener(events::GUILD_CREATE, move |frame| {
            let guild: Guild = frame.decode()?;
            info!(
                "Guild available: {} ({})",
                guild.name.as_deref().unwrap_or("unnamed"),
                guild.id
            );

            if let Some(greeting) = &greeting {
                if greeted.lock().insert(guild.id.clone()) {
                    post_greeting(&guild, greeting, Arc::clone(&rest));
                }
            }
            Ok(())
        });

        connection.register_event_listener(events::MESSAGE_CREATE, |frame| {
            let message: Message = frame.decode()?;
            info!(
                "[{}] {}: {}",
                message.channel_id,
                message.author.tag(),
                message.content
            );
            Ok(())
        });
    }

    fn log_stats(&self, connection: &GatewayConnection) {
        while let Some(event) = connection.try_recv_event() {
            match event {
                ConnectionEvent::Error(e) => warn!("Gateway error: {}", e),
                other => debug!("Gateway event: {:?}", other),
            }
        }

        info!("{}", stats_line(connection));
    }
}

fn stats_line(connection: &GatewayConnection) -> String {
    let metrics = connection.metrics();
    format!(
        "Stats: {} frames in, {} out, {} heartbeats ({} acked), latency {:?}, last sequence {:?}",
        metrics.frames_received,
        metrics.frames_sent,
        metrics.heartbeats_sent,
        metrics.heartbeat_acks,
        connection.latency(),
        connection.last_sequence()
    )
}

fn post_greeting(guild: &Guild, greeting: &GreetingConfig, rest: Arc<RestClient>) {
    let Some(channel) = guild.channel_named(&greeting.channel_name) else {
        warn!(
            "Guild {} has no channel named #{}",
            guild.id, greeting.channel_name
        );
        return;
    };

    let channel_id = channel.id.clone();
    let message = OutgoingMessage::text(greeting.content.clone());
    tokio::spawn(async move {
        match rest.send_message(&channel_id, &message).await {
            Ok(sent) => info!("Greeting {} posted to channel {}", sent.id, channel_id),
            Err(e) => warn!("Failed to post greeting to channel {}: {}", channel_id, e),
        }
    });
}

impl BinaryRunner for GatewayBot {
    async fn run(&mut self) -> Result<()> {
        let rest = Arc::new(self.rest_client()?);
        let connection = self.connect(&rest).await?;
        self.register_listeners(&connection, Arc::clone(&rest));

        let user = match connection.identify(Some(self.config.presence())).await {
            Ok(user) => user,
            Err(e) => {
                connection.close().await;
                return Err(e.into());
            }
        };
        info!("Logged in as {}", user.tag());

        let mut stats = tokio::time::interval(self.run.stats_interval());
        stats.tick().await;

        let lost: Option<Disconnect> = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal (Ctrl+C)");
                    break None;
                }
                disconnect = connection.wait_closed() => break Some(disconnect),
                _ = stats.tick() => self.log_stats(&connection),
            }
        };

        self.final_stats = Some(stats_line(&connection));

        match lost {
            None => {
                let disconnect = connection.close().await;
                info!("Gateway connection closed: {}", disconnect);
                Ok(())
            }
            Some(disconnect) => {
                error!("Gateway connection lost: {}", disconnect);
                connection.close().await;
                Err(disconnect.into_error().into())
            }
        }
    }

    fn config(&self) -> &RunConfig {
        &self.run
    }

    fn summary(&self) -> Option<String> {
        self.final_stats.clone()
    }
}
