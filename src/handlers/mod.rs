//! Bot command handlers.
//!
//! This module contains the [`Handler`] trait and the command [`Registry`]
//! that dispatches `/command` messages to their handlers.
//!
//! Every command gets a reply. Handlers reply to refusals themselves
//! and return `Ok`; an `Err` means something broke, and the registry
//! answers with a generic apology.

mod basic;
mod feeds;
mod helpers;
mod moderation;
mod packages;

pub use basic::{HelpHandler, LinkHandler, PidHandler, PingHandler, StartHandler};
pub use feeds::FeedHandler;
pub use moderation::{BanHandler, FloodHandler};
pub use packages::PackageHandler;

use crate::error::{BotError, HandlerResult};
use crate::state::AppState;
use crate::telemetry::CommandTimer;
use async_trait::async_trait;
use chatlog_proto::{BotCommand, Message, User};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, warn};

const APOLOGY: &str = "Oops. Something went wrong!";

/// Handler context passed to each command handler.
pub struct Context<'a> {
    /// Shared service state.
    pub state: &'a Arc<AppState>,
    /// The message carrying the command.
    pub msg: &'a Message,
    /// The parsed command.
    pub command: &'a BotCommand<'a>,
}

impl Context<'_> {
    pub fn chat_id(&self) -> i64 {
        self.msg.chat.id
    }

    pub fn sender(&self) -> Option<&User> {
        self.msg.from.as_ref()
    }

    /// Display name of the sender.
    pub fn sender_name(&self) -> String {
        self.sender().map(ToString::to_string).unwrap_or_default()
    }

    /// The message the command replied to.
    pub fn replied(&self) -> Option<&Message> {
        self.msg.reply_to_message.as_deref()
    }

    /// Reply to the command message.
    pub async fn reply(&self, text: &str) -> HandlerResult {
        self.send(text, Some(self.msg.message_id)).await
    }

    /// Send to the command's chat, optionally replying to another message.
    pub async fn send(&self, text: &str, reply_to: Option<i64>) -> HandlerResult {
        self.state
            .courier
            .send(self.chat_id(), text, reply_to)
            .await?;
        Ok(())
    }

    /// Whether the bot administers this chat.
    pub async fn bot_is_admin(&self) -> Result<bool, BotError> {
        Ok(self
            .state
            .messenger
            .is_admin(self.chat_id(), self.state.me.id)
            .await?)
    }
}

/// Trait implemented by all command handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult;
}

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Greetings and jokes
        handlers.insert("start", Box::new(StartHandler));
        handlers.insert("help", Box::new(HelpHandler));
        handlers.insert("ping", Box::new(PingHandler));

        // Message references
        handlers.insert("pid", Box::new(PidHandler));
        handlers.insert("link", Box::new(LinkHandler));

        // Moderation
        handlers.insert("ban", Box::new(BanHandler::ban()));
        handlers.insert("unban", Box::new(BanHandler::unban()));
        handlers.insert("flood", Box::new(FloodHandler));

        // Package lookups
        handlers.insert("dnf", Box::new(PackageHandler));
        handlers.insert("yum", Box::new(PackageHandler));

        // Feed management
        handlers.insert("feed", Box::new(FeedHandler));

        Self { handlers }
    }

    pub fn knows(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Dispatch a command to its handler.
    ///
    /// Unknown commands are ignored: other bots in the chat may handle them.
    pub async fn dispatch(&self, ctx: &Context<'_>) {
        let name = ctx.command.name.as_str();
        let Some(handler) = self.handlers.get(name) else {
            debug!(command = name, "Ignoring unknown command");
            return;
        };

        let span = crate::telemetry::spans::command(name, ctx.chat_id(), ctx.sender().map(|u| u.id));
        async {
            let _timer = CommandTimer::new(name);
            if let Err(e) = handler.handle(ctx).await {
                crate::metrics::record_command_error(name, e.error_code());
                warn!(error = %e, retryable = e.is_retryable(), "Command failed");
                if let Err(e) = ctx.reply(APOLOGY).await {
                    warn!(error = %e, "Failed to send apology");
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
