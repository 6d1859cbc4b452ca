//! Moderation, maintenance, feed and package lookup configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    default_cooldown, default_feed_update_period, default_max_flood_level,
    default_package_binary, default_package_timeout, default_request_timeout,
    default_sweep_period, default_true,
};

/// Flood moderation configuration.
///
/// A user accused `max_level` times (by distinct accusers, or by the same
/// accuser after the cooldown) is kicked from the chat.
#[derive(Debug, Clone, Deserialize)]
pub struct FloodConfig {
    /// Accusations that trigger a kick (default: 3).
    #[serde(default = "default_max_flood_level")]
    pub max_level: i64,
    /// How long one accuser must wait before accusing the same user again,
    /// in seconds (default: 600).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl FloodConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            max_level: default_max_flood_level(),
            cooldown_secs: default_cooldown(),
        }
    }
}

/// Background cache maintenance.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How often expired accusations are swept, in seconds (default: 60).
    #[serde(default = "default_sweep_period")]
    pub sweep_period_secs: u64,
    /// Refresh every known user's profile photo at startup (default: true).
    #[serde(default = "default_true")]
    pub refresh_photos_on_start: bool,
}

impl CacheConfig {
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_period_secs: default_sweep_period(),
            refresh_photos_on_start: true,
        }
    }
}

/// Feed polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    /// Poll registered feeds (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between polling rounds (default: 300).
    #[serde(default = "default_feed_update_period")]
    pub update_period_secs: u64,
    /// Timeout for fetching one feed document, in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl FeedsConfig {
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_period_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_period_secs: default_feed_update_period(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// `/dnf` and `/yum` configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PackagesConfig {
    /// Answer package queries at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Absolute path of the package manager (default: /usr/bin/dnf).
    #[serde(default = "default_package_binary")]
    pub binary: String,
    /// Kill the package manager after this many seconds (default: 60).
    #[serde(default = "default_package_timeout")]
    pub timeout_secs: u64,
}

impl PackagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: default_package_binary(),
            timeout_secs: default_package_timeout(),
        }
    }
}
