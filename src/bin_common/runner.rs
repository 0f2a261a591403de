//! Binary runner utilities

use std::time::Duration;
use tracing::{error, info};

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Interval between connection stats log lines
    pub stats_interval_secs: u64,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats_interval_secs: 300,
        }
    }

    pub fn with_stats_interval(mut self, secs: u64) -> Self {
        self.stats_interval_secs = secs;
        self
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

/// A long-running binary with startup and shutdown logging
pub trait BinaryRunner {
    /// Run the application until shutdown or disconnect
    async fn run(&mut self) -> anyhow::Result<()>;

    fn config(&self) -> &RunConfig;

    /// Line logged once `run` returns
    fn summary(&self) -> Option<String> {
        None
    }

    /// Execute `run` between a startup and a shutdown banner
    async fn execute(&mut self) -> anyhow::Result<()> {
        info!("========================================");
        info!("Starting {} (Ctrl+C to stop)", self.config().name);
        info!("========================================");

        let result = self.run().await;

        match &result {
            Ok(()) => info!("{} stopped", self.config().name),
            Err(e) => error!("{} stopped: {:#}", self.config().name, e),
        }
        if let Some(summary) = self.summary() {
            info!("{}", summary);
        }
        result
    }
}
