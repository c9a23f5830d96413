//! Application-level configuration loading, including settlement and presence timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HALVES_BACK_CONFIG_PATH";

const DEFAULT_GAME_TIMEOUT_SECS: u64 = 2 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_STALE_AFTER_SECS: u64 = 60 * 60;
const DEFAULT_LEADERBOARD_LIMIT: usize = 100;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub(crate) game_timeout: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) stale_after: Duration,
    pub(crate) leaderboard_limit: usize,
    pub(crate) max_concurrent_requests: usize,
    pub(crate) push_webhook: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// The `PUSH_WEBHOOK` environment variable wins over the file, so deployments
    /// can rotate the webhook without touching the config volume.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(url) = env::var("PUSH_WEBHOOK") {
            if !url.is_empty() {
                config.push_webhook = Some(url);
            }
        }

        config
    }

    /// Horizon after which an open game is forcibly settled.
    pub fn game_timeout(&self) -> Duration {
        self.game_timeout
    }

    /// Interval between presence staleness sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Age past which an online device with no activity is considered stale.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Number of rows returned by the leaderboard read.
    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit
    }

    /// Cap on concurrently processed requests before shedding with 503.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Webhook for fire-and-forget push notifications, when configured.
    pub fn push_webhook(&self) -> Option<&str> {
        self.push_webhook.as_deref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_timeout: Duration::from_secs(DEFAULT_GAME_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            push_webhook: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    game_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    stale_after_secs: Option<u64>,
    leaderboard_limit: Option<usize>,
    max_concurrent_requests: Option<usize>,
    push_webhook: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            game_timeout: value
                .game_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.game_timeout),
            sweep_interval: value
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            stale_after: value
                .stale_after_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            leaderboard_limit: value.leaderboard_limit.unwrap_or(defaults.leaderboard_limit),
            max_concurrent_requests: value
                .max_concurrent_requests
                .unwrap_or(defaults.max_concurrent_requests),
            push_webhook: value.push_webhook,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_timings() {
        let config = AppConfig::default();
        assert_eq!(config.game_timeout(), Duration::from_secs(7200));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.stale_after(), Duration::from_secs(3600));
        assert_eq!(config.leaderboard_limit(), 100);
        assert!(config.push_webhook().is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "game_timeout_secs": 60 }"#).expect("valid json");
        let config: AppConfig = raw.into();
        assert_eq!(config.game_timeout(), Duration::from_secs(60));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
    }
}
