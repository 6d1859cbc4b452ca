//! `/ban`, `/unban` and `/flood`.

use super::helpers::{UserLookup, format_remaining, resolve_user};
use super::{Context, Handler};
use crate::error::HandlerResult;
use crate::security::FloodOutcome;
use crate::telegram::ApiError;
use async_trait::async_trait;
use tracing::{debug, info, warn};

const BOT_NOT_ADMIN: &str = "Bot is not an administrator of this chat. Command unavailable!";
const UNKNOWN_SENDER: &str = "Can't tell who is asking. Send the command from your own account.";

/// Kick or unban a user found by name in the archive.
pub struct BanHandler {
    unban: bool,
}

impl BanHandler {
    pub fn ban() -> Self {
        Self { unban: false }
    }

    pub fn unban() -> Self {
        Self { unban: true }
    }
}

#[async_trait]
impl Handler for BanHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        if !ctx.msg.chat.kind.is_group() {
            return ctx.reply("Whom do we ban in private? 😂").await;
        }
        if !ctx.bot_is_admin().await? {
            warn!(chat_id = ctx.chat_id(), "Ban requested but bot is not an administrator");
            return ctx.reply(BOT_NOT_ADMIN).await;
        }

        let Some(caller) = ctx.sender() else {
            return ctx.reply(UNKNOWN_SENDER).await;
        };
        if !ctx.state.messenger.is_admin(ctx.chat_id(), caller.id).await? {
            warn!(chat_id = ctx.chat_id(), user_id = caller.id, "Ban requested by non-administrator");
            return ctx
                .reply("You are not an administrator of this chat! Bans and unbans are not yours to give 🤔")
                .await;
        }

        let query = ctx.command.args;
        if query.is_empty() {
            return ctx.reply("Whom do we ban?").await;
        }

        let target = match resolve_user(&ctx.state.db, query).await? {
            UserLookup::Found(user) => user,
            UserLookup::NotFound => return ctx.reply(&format!("User {query} not found")).await,
            UserLookup::Ambiguous(users) => {
                let list: Vec<String> = users.iter().map(ToString::to_string).collect();
                return ctx
                    .reply(&format!(
                        "More than one user matched. Try with @username.\n{}",
                        list.join("\n")
                    ))
                    .await;
            }
        };

        let messenger = &ctx.state.messenger;
        let result = if self.unban {
            messenger.unban_member(ctx.chat_id(), target.id).await
        } else {
            messenger.kick_member(ctx.chat_id(), target.id).await
        };

        match result {
            Ok(()) => {
                info!(
                    chat_id = ctx.chat_id(),
                    user_id = target.id,
                    unban = self.unban,
                    "Ban state changed"
                );
                ctx.reply("Done").await
            }
            Err(ApiError::Api(e)) => {
                warn!(chat_id = ctx.chat_id(), user_id = target.id, error = %e, "Ban request rejected");
                ctx.reply(&format!(
                    "*Error*: ``` code={}, description={} ```",
                    e.code, e.description
                ))
                .await
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Call the author of the replied-to message a flooder.
pub struct FloodHandler;

#[async_trait]
impl Handler for FloodHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        if !ctx.msg.chat.kind.is_group() {
            return ctx.reply("Flood control only works in groups.").await;
        }
        if !ctx.bot_is_admin().await? {
            warn!(chat_id = ctx.chat_id(), "Flood report but bot is not an administrator");
            return ctx.reply(BOT_NOT_ADMIN).await;
        }

        let Some((flood_msg, accused)) = ctx
            .replied()
            .and_then(|m| m.from.as_ref().map(|from| (m, from)))
        else {
            return ctx
                .reply("Write the command as a reply to the flood message, then it works.")
                .await;
        };
        let Some(accuser) = ctx.sender() else {
            return ctx.reply(UNKNOWN_SENDER).await;
        };

        let outcome = ctx
            .state
            .flood
            .accuse(ctx.chat_id(), accused.id, accuser.id)
            .await?;
        debug!(accused = accused.id, accuser = accuser.id, outcome = outcome.as_str(), "Flood accusation");

        match outcome {
            FloodOutcome::BotTarget => ctx.reply(&format!("Nice try {accuser} 😜")).await,
            FloodOutcome::SelfAccusation => ctx.reply("Self-poke? 😜").await,
            FloodOutcome::Cooldown { remaining } => {
                ctx.reply(&format!(
                    "You recently declared {accused} a flooder. Wait a while: {}",
                    format_remaining(remaining)
                ))
                .await
            }
            FloodOutcome::Warned { attempts_left, .. } => {
                ctx.send(
                    &format!(
                        "{accused} you were called a flooder, {attempts_left} more and you will be expelled!"
                    ),
                    Some(flood_msg.message_id),
                )
                .await
            }
            FloodOutcome::Expelled { kicked: true } => {
                ctx.send(
                    &format!(
                        "{accused} the patience of this chat's natives has run out. We expel you!"
                    ),
                    None,
                )
                .await
            }
            FloodOutcome::Expelled { kicked: false } => {
                ctx.reply(&format!("{accused} should be expelled, but the kick failed."))
                    .await
            }
        }
    }
}
