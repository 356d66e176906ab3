//! Configuration for the auproxy lobby bridge.
//!
//! Settings persist to disk as a RON file, accept CLI overrides via clap, and
//! deserialize with defaults so older and newer files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LobbyConfig, ReconnectSettings, Region, TimingConfig, default_config_dir,
    default_log_dir,
};
pub use error::ConfigError;
