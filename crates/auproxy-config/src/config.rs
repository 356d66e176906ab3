//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_NAME: &str = "auproxy";

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Which lobby to attach to.
    pub lobby: LobbyConfig,
    /// Join retry budget and backoff.
    pub reconnect: ReconnectSettings,
    /// Grace delays and synchronization timeouts.
    pub timing: TimingConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Master server region. Each region maps to one fixed master endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum Region {
    /// North American master server.
    #[default]
    NorthAmerica,
    /// European master server.
    Europe,
    /// Asian master server.
    Asia,
}

/// Target lobby configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LobbyConfig {
    /// Room code of the lobby to follow (e.g. `"ABCDEF"`).
    pub game_code: String,
    /// Master server region.
    pub region: Region,
    /// Name sent when identifying with the master server.
    pub username: String,
}

/// Join retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Join attempts (connect + identify + join) before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound for the retry delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 - 1.0) applied as +/- to each delay.
    pub jitter: f64,
}

/// Timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between a meeting message and its deferred emission, in milliseconds.
    pub meeting_grace_ms: u64,
    /// Give up waiting for the initial spawn burst after this many seconds.
    /// `None` waits forever.
    pub spawn_timeout_secs: Option<u64>,
    /// Give up waiting for the first settings sync after this many seconds.
    /// `None` waits forever.
    pub settings_timeout_secs: Option<u64>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the log directory.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            game_code: String::new(),
            region: Region::default(),
            username: APP_NAME.to_string(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 250,
            backoff_multiplier: 2.0,
            max_delay_ms: 4_000,
            jitter: 0.1,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            meeting_grace_ms: 2_500,
            spawn_timeout_secs: None,
            settings_timeout_secs: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

// --- Platform directories ---

/// Platform configuration directory for the bridge (`<config>/auproxy`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Directory for JSON log files, next to the config directory.
pub fn default_log_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_local_dir()
        .or_else(dirs::config_dir)
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(APP_NAME).join("logs"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(2))
                .unwrap();
        assert!(ron_str.contains("max_attempts: 5"));
        assert!(ron_str.contains("meeting_grace_ms: 2500"));
        assert!(ron_str.contains("username: \"auproxy\""));
    }

    #[test]
    fn test_default_timeouts_wait_forever() {
        let timing = TimingConfig::default();
        assert_eq!(timing.spawn_timeout_secs, None);
        assert_eq!(timing.settings_timeout_secs, None);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(lobby: (game_code: \"ABCDEF\"))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lobby.game_code, "ABCDEF");
        assert_eq!(config.lobby.region, Region::NorthAmerica);
        assert_eq!(config.reconnect, ReconnectSettings::default());
    }

    #[test]
    fn test_region_parses_by_name() {
        let ron_str = "(lobby: (region: Asia))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lobby.region, Region::Asia);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.lobby.game_code = "QWERTY".to_string();
        config.lobby.region = Region::Europe;
        config.timing.spawn_timeout_secs = Some(30);

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.reconnect.max_attempts = 9;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.map(|c| c.reconnect.max_attempts), Some(9));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_log_dir_ends_with_app_name() {
        if let Ok(dir) = default_log_dir() {
            assert!(dir.ends_with("auproxy/logs"));
        }
    }
}
