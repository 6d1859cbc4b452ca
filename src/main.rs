//! chatlogd - chat archival bot
//!
//! Archives every message the bot sees, mirrors attached media, lets chat
//! members vote flooders out, broadcasts registered news feeds and serves
//! the archive over HTTP.

mod archive;
mod bot;
mod cache;
mod config;
mod db;
mod error;
mod feeds;
mod handlers;
mod http;
mod media;
mod metrics;
mod security;
mod state;
mod telegram;
mod telemetry;

use crate::bot::Bot;
use crate::config::{Config, LogConfig};
use crate::db::Database;
use crate::feeds::HttpFeedSource;
use crate::state::AppState;
use crate::telegram::{BotApi, Messenger};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chatlogd")]
#[command(about = "Chat archival bot")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "chatlogd.toml")]
    config: PathBuf,
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", args.config.display()))?;
    init_tracing(&config.log);

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!(
            "{} configuration error(s) in {}",
            errors.len(),
            args.config.display()
        );
    }
    let config = Arc::new(config);

    metrics::init();

    let db = Database::new(&config.database.path).await?;
    info!(path = %config.database.path, "Database ready");

    let api = BotApi::new(
        config.bot.api_url.clone(),
        config.bot.token.clone(),
        config.bot.request_timeout(),
    )?;
    let me = api.get_me().await?;
    info!(id = me.id, username = ?me.username, "Authorized");
    let messenger: Arc<dyn Messenger> = Arc::new(api);

    let feed_source = Arc::new(HttpFeedSource::new(config.feeds.request_timeout())?);
    let state = Arc::new(AppState::build(Arc::clone(&config), db, me, messenger, feed_source).await?);
    info!(pairs = state.abuse.len(), "Loaded flood accusations");

    match state.files.warm().await {
        Ok(count) => info!(count, "File name cache warmed"),
        Err(e) => warn!(error = %e, "Failed to warm file name cache"),
    }

    // Expired accusation sweep
    {
        let abuse = Arc::clone(&state.abuse);
        let period = config.cache.sweep_period();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = abuse.sweep().await;
                metrics::set_abuse_pairs(abuse.len());
                if removed > 0 {
                    info!(removed, "Expired flood accusations removed");
                }
            }
        });
    }

    if config.feeds.enabled {
        Arc::clone(&state.feeds).spawn(config.feeds.update_period());
        info!(period_secs = config.feeds.update_period_secs, "Feed polling started");
    } else {
        info!("Feed polling disabled");
    }

    if config.cache.refresh_photos_on_start {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let users = match state.db.users().list().await {
                Ok(users) => users,
                Err(e) => {
                    warn!(error = %e, "Failed to list users for photo refresh");
                    return;
                }
            };
            for user in users.iter().filter(|u| !u.is_bot) {
                if let Err(e) = state.photos.refresh(user.id).await {
                    debug!(user_id = user.id, error = %e, "Profile photo refresh failed");
                }
            }
            info!(count = users.len(), "Profile photos refreshed");
        });
    }

    if config.http.enabled {
        let state = Arc::clone(&state);
        let addr = config.http.listen;
        tokio::spawn(async move {
            http::run_http_server(state, addr).await;
        });
    } else {
        info!("Web view disabled");
    }

    let bot = Bot::new(Arc::clone(&state));
    tokio::select! {
        _ = bot.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
