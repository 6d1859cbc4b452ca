//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, BotConfig, HttpConfig, LogConfig)
//! - [`moderation`]: Flood moderation, cache sweeping, feeds and package lookups
//! - [`validation`]: Startup checks that collect every problem at once

mod defaults;
mod moderation;
mod types;
pub mod validation;

pub use moderation::{CacheConfig, FeedsConfig, FloodConfig, PackagesConfig};
pub use types::{
    BotConfig, Config, ConfigError, DatabaseConfig, HttpConfig, LogConfig, StorageConfig,
};
