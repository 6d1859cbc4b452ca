//! Greeting, help, joke ping and message reference commands.

use super::{Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use chatlog_proto::format::{code_block, message_link};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NEED_REPLY: &str = "Write the command as a reply to a message, then it works.";

const HELP: &str = "Bot commands.
/start - greeting (standard for any bot)
/help - this help
/ping - joke ping
/pid - id of the message you reply to
/link - public link to the message you reply to
/ban name - ban a user in the group (bot must be an administrator)
/unban name - lift a user's ban in the group (bot must be an administrator)
/flood - reply to a flooder's message to call them out
/dnf [info provides repolist repoquery] - same as the system command
/yum [info provides repolist repoquery] - same as the system command
/feed add|del|list - manage news feeds (bot administrators only)";

pub struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        ctx.reply(&format!("Hello {}!", ctx.sender_name())).await
    }
}

pub struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        ctx.send(HELP, None).await
    }
}

/// Joke ping: deterministic for a given user and message.
pub struct PingHandler;

/// The ping reply for a user and message.
pub fn ping_reply(name: &str, user_id: i64, message_id: i64) -> String {
    let seed = (user_id as u64).rotate_left(32) ^ message_id as u64;
    let mut rng = StdRng::seed_from_u64(seed);
    if rng.gen_range(0..12) == 0 {
        return "Request timed out 😜".to_string();
    }
    format!("{name} ping from you {:.3} 😜", rng.r#gen::<f32>())
}

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        let user_id = ctx.sender().map(|u| u.id).unwrap_or_default();
        let text = ping_reply(&ctx.sender_name(), user_id, ctx.msg.message_id);
        ctx.reply(&text).await
    }
}

pub struct PidHandler;

#[async_trait]
impl Handler for PidHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        let Some(replied) = ctx.replied() else {
            return ctx.reply(NEED_REPLY).await;
        };
        ctx.reply(&code_block(&replied.message_id.to_string())).await
    }
}

pub struct LinkHandler;

#[async_trait]
impl Handler for LinkHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        let Some(replied) = ctx.replied() else {
            return ctx.reply(NEED_REPLY).await;
        };
        let text = match ctx.msg.chat.public_username() {
            Some(username) => message_link(username, replied.message_id),
            None => format!(
                "This is not a public chat, a link is impossible. Message ID = *{}*",
                replied.message_id
            ),
        };
        ctx.reply(&text).await
    }
}
