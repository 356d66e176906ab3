//! Structured logging for the lobby bridge.
//!
//! Installs a `tracing` subscriber with console output and, when requested,
//! a JSON file layer for post-mortem analysis of a lobby session. The level
//! comes from the configuration and can be overridden with `RUST_LOG`.

use auproxy_config::Config;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

/// Build the filter string for `config`, falling back to `info`.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize the tracing subscriber.
///
/// Sets up:
/// - Console output with uptime timestamps, module paths, and levels
/// - JSON file logging to `log_dir/auproxy.log` when `log_to_file` is set
/// - Environment-based filtering (`RUST_LOG` wins over the config)
///
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls harmless.
///
/// # Examples
///
/// ```no_run
/// use auproxy_config::Config;
/// use auproxy_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, log_to_file: bool, config: Option<&Config>) -> bool {
    let filter_str = filter_directive(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if log_to_file
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("auproxy.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        return subscriber.with(file_layer).try_init().is_ok();
    }

    subscriber.try_init().is_ok()
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        assert!(format!("{}", filter).contains("info"));
    }

    #[test]
    fn test_filter_comes_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "warn,auproxy_bridge=debug".to_string();
        assert_eq!(filter_directive(Some(&config)), "warn,auproxy_bridge=debug");
    }

    #[test]
    fn test_empty_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), "info");
        assert_eq!(filter_directive(None), "info");
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,auproxy_bridge=trace",
            "warn,auproxy_bridge::reconnect=debug",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_second_init_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();

        let first = init_logging(Some(dir.path()), true, Some(&config));
        let second = init_logging(None, false, None);

        assert!(first, "first init should install the subscriber");
        assert!(!second, "second init should be a no-op");
        assert!(dir.path().join("auproxy.log").exists());
    }
}
