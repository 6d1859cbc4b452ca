//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_api_url, default_database_path, default_listen, default_log_level,
    default_poll_timeout, default_request_timeout, default_static_dir, default_true,
};
use super::moderation::{CacheConfig, FeedsConfig, FloodConfig, PackagesConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot API credentials and polling.
    pub bot: BotConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Where downloaded media and profile photos are kept.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Flood moderation.
    #[serde(default)]
    pub flood: FloodConfig,
    /// Background cache maintenance.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Feed polling.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// `/dnf` and `/yum` lookups.
    #[serde(default)]
    pub packages: PackagesConfig,
    /// Archive web view.
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Bot API configuration.
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by the platform.
    pub token: String,
    /// Base URL of the Bot API server.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Timeout for every other API request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Users allowed to manage feeds.
    #[serde(default)]
    pub admins: Vec<i64>,
}

impl BotConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("admins", &self.admins)
            .finish()
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for a throwaway database).
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Media storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for downloaded files; served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl StorageConfig {
    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
        }
    }
}

/// Web view configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Serve the archive and `/metrics` (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Listen address (default: 127.0.0.1:8080).
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
        }
    }
}

/// Logging configuration.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter directive (default: "info").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
[bot]
token = "123:abc"
"#,
        )
        .unwrap();

        assert_eq!(config.bot.api_url, "https://api.telegram.org");
        assert_eq!(config.bot.poll_timeout(), Duration::from_secs(60));
        assert_eq!(config.database.path, "chatlogd.db");
        assert_eq!(config.storage.static_dir(), PathBuf::from("static"));
        assert_eq!(config.flood.max_level, 3);
        assert_eq!(config.flood.cooldown(), Duration::from_secs(600));
        assert_eq!(config.feeds.update_period(), Duration::from_secs(300));
        assert!(config.http.enabled);
        assert_eq!(config.log.level, "info");
        assert!(!config.bot.is_admin(1));
    }

    #[test]
    fn token_is_not_logged() {
        let config: Config = toml::from_str(
            r#"
[bot]
token = "123:very-secret"
admins = [7]
"#,
        )
        .unwrap();

        let debug = format!("{:?}", config.bot);
        assert!(!debug.contains("very-secret"));
        assert!(config.bot.is_admin(7));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/chatlogd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
