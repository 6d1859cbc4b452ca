//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

pub fn default_poll_timeout() -> u64 {
    60
}

pub fn default_request_timeout() -> u64 {
    30
}

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "chatlogd.db".to_string()
}

pub fn default_static_dir() -> String {
    "static".to_string()
}

// =============================================================================
// HTTP Defaults
// =============================================================================

pub fn default_listen() -> std::net::SocketAddr {
    std::net::SocketAddr::from(([127, 0, 0, 1], 8080))
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Moderation Defaults
// =============================================================================

pub fn default_max_flood_level() -> i64 {
    3
}

pub fn default_cooldown() -> u64 {
    600
}

pub fn default_sweep_period() -> u64 {
    60
}

// =============================================================================
// Feed Defaults
// =============================================================================

pub fn default_feed_update_period() -> u64 {
    300
}

// =============================================================================
// Package Lookup Defaults
// =============================================================================

pub fn default_package_binary() -> String {
    "/usr/bin/dnf".to_string()
}

pub fn default_package_timeout() -> u64 {
    60
}
