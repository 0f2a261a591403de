//! Discord Gateway Bot - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **config**: YAML + environment configuration
//! - **logging**: tracing subscriber setup
//! - **app**: the gateway bot runner
//! - **gateway**, **rest**, **types**: re-exported from the workspace
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use discord_bot::bin_common::{load_config_from_env, ConfigType};
//! use discord_bot::config::BotConfig;
//! ```

// Re-export workspace libraries for convenience
pub use gateway;
pub use rest;
pub use types;

pub mod app;
pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
