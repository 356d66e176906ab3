//! Command-line argument parsing for the bridge.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, Region};

/// auproxy command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "auproxy", about = "Public lobby bridge")]
pub struct CliArgs {
    /// Room code of the lobby to follow.
    #[arg(long)]
    pub game_code: Option<String>,

    /// Master server region.
    #[arg(long, value_enum)]
    pub region: Option<Region>,

    /// Join attempts before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait for the initial spawn burst.
    #[arg(long)]
    pub spawn_timeout: Option<u64>,

    /// Seconds to wait for the first settings sync.
    #[arg(long)]
    pub settings_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref code) = args.game_code {
            self.lobby.game_code = code.to_uppercase();
        }
        if let Some(region) = args.region {
            self.lobby.region = region;
        }
        if let Some(attempts) = args.max_attempts {
            self.reconnect.max_attempts = attempts;
        }
        if let Some(secs) = args.spawn_timeout {
            self.timing.spawn_timeout_secs = Some(secs);
        }
        if let Some(secs) = args.settings_timeout {
            self.timing.settings_timeout_secs = Some(secs);
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
