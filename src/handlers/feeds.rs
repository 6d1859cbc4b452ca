//! `/feed add|del|list`, for bot administrators.

use super::{Context, Handler};
use crate::db::DbError;
use crate::error::HandlerResult;
use crate::feeds::FeedError;
use async_trait::async_trait;
use chatlog_proto::format::escape_markdown;
use tracing::warn;

const USAGE: &str = "Usage: /feed add <url> | /feed del <url> | /feed list";

pub struct FeedHandler;

#[async_trait]
impl Handler for FeedHandler {
    async fn handle(&self, ctx: &Context<'_>) -> HandlerResult {
        let allowed = ctx
            .sender()
            .is_some_and(|u| ctx.state.config.bot.is_admin(u.id));
        if !allowed {
            warn!(user = %ctx.sender_name(), "Feed management refused");
            return ctx.reply("Only bot administrators manage feeds.").await;
        }

        let mut words = ctx.command.arg_words();
        let feeds = &ctx.state.feeds;
        match (words.next(), words.next()) {
            (Some("add"), Some(url)) => match feeds.add_feed(url).await {
                Ok(title) => {
                    ctx.reply(&format!("Feed *{}* added", escape_markdown(&title)))
                        .await
                }
                Err(FeedError::Db(DbError::AlreadyExists(_))) => {
                    ctx.reply("Feed already registered").await
                }
                Err(FeedError::Db(e)) => Err(e.into()),
                Err(e) => {
                    warn!(url, error = %e, "Unable to add feed");
                    ctx.reply(&format!("Unable to add feed: {e}")).await
                }
            },
            (Some("del"), Some(url)) => match feeds.remove_feed(url).await {
                Ok(()) => ctx.reply("Feed removed").await,
                Err(FeedError::Db(DbError::NotFound(_))) => ctx.reply("No such feed").await,
                Err(e) => Err(e.into()),
            },
            (Some("list"), None) => {
                let list = feeds.list().await?;
                if list.is_empty() {
                    return ctx.reply("No feeds registered").await;
                }
                let lines: Vec<String> = list
                    .iter()
                    .map(|f| format!("{} {}", escape_markdown(&f.name), escape_markdown(&f.url)))
                    .collect();
                ctx.reply(&lines.join("\n")).await
            }
            _ => ctx.reply(USAGE).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{group, text_message};
    use crate::feeds::{FeedSource, ParsedFeed};
    use crate::handlers::tests::{last_text, run};
    use crate::state::tests::state_with;
    use crate::telegram::fake::user;
    use std::sync::Arc;

    const URL: &str = "https://example.org/feed.xml";

    /// Knows exactly one feed.
    struct OneFeed;

    #[async_trait]
    impl FeedSource for OneFeed {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError> {
            if url != URL {
                return Err(FeedError::Status(404));
            }
            Ok(ParsedFeed {
                title: "Example News".to_string(),
                items: Vec::new(),
            })
        }
    }

    fn admin_says(id: i64, text: &str) -> chatlog_proto::Message {
        text_message(group(-1), id, user(1, "Root"), text)
    }

    #[tokio::test]
    async fn non_admins_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state_with(dir.path(), "", Arc::new(OneFeed)).await;

        let msg = text_message(group(-1), 1, user(2, "Bob"), &format!("/feed add {URL}"));
        run(&state, &msg).await;
        assert_eq!(last_text(&fake), "Only bot administrators manage feeds.");
        assert!(state.feeds.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state_with(dir.path(), "", Arc::new(OneFeed)).await;

        run(&state, &admin_says(1, "/feed list")).await;
        assert_eq!(last_text(&fake), "No feeds registered");

        run(&state, &admin_says(2, &format!("/feed add {URL}"))).await;
        assert_eq!(last_text(&fake), "Feed *Example News* added");

        run(&state, &admin_says(3, &format!("/feed add {URL}"))).await;
        assert_eq!(last_text(&fake), "Feed already registered");

        run(&state, &admin_says(4, "/feed list")).await;
        let text = last_text(&fake);
        assert!(text.starts_with("Example News "));
        assert!(text.contains("example.org"));

        run(&state, &admin_says(5, &format!("/feed del {URL}"))).await;
        assert_eq!(last_text(&fake), "Feed removed");

        run(&state, &admin_says(6, &format!("/feed del {URL}"))).await;
        assert_eq!(last_text(&fake), "No such feed");
    }

    #[tokio::test]
    async fn unreachable_feed_and_usage() {
        let dir = tempfile::tempdir().unwrap();
        let (state, fake) = state_with(dir.path(), "", Arc::new(OneFeed)).await;

        run(&state, &admin_says(1, "/feed add https://example.org/missing")).await;
        assert_eq!(last_text(&fake), "Unable to add feed: feed server answered 404");

        run(&state, &admin_says(2, "/feed")).await;
        assert_eq!(last_text(&fake), USAGE);
    }
}
