//! Feed ingestion.
//!
//! Registered feeds are polled on a fixed period. Every item not seen
//! before is stored and broadcast to every archived chat. An item is "seen"
//! once its `(feed url, guid)` row exists; there is no expiry.
//!
//! A feed whose previous cycle is still running is skipped for the round,
//! see [`FeedLockRegistry`].

mod source;

pub use source::{FeedSource, HttpFeedSource, ParsedFeed, ParsedItem, parse};

use crate::archive::Courier;
use crate::cache::FeedLockRegistry;
use crate::db::{Database, DbError, FeedItemRecord, FeedRecord};
use chatlog_proto::format::{escape_markdown, link};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("feed server answered {0}")]
    Status(u16),
    #[error("not a feed: {0}")]
    Parse(String),
}

/// Result of one refresh of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle for the feed was in flight.
    Skipped,
    Completed { new_items: usize },
}

/// Broadcast text for a news item.
pub fn news_text(item: &FeedItemRecord) -> String {
    let mut text = format!(
        "*{}*\n{}",
        escape_markdown(&item.feed_title),
        link(&item.title, &item.link)
    );
    if let Some(image_url) = item.image_url.as_deref().filter(|u| !u.is_empty()) {
        let image_title = item.image_title.as_deref().unwrap_or_default();
        text.push('\n');
        text.push_str(&link(image_title, image_url));
    }
    text
}

pub struct FeedIngestion {
    db: Database,
    source: Arc<dyn FeedSource>,
    courier: Arc<Courier>,
    locks: Arc<FeedLockRegistry>,
}

impl FeedIngestion {
    pub fn new(
        db: Database,
        source: Arc<dyn FeedSource>,
        courier: Arc<Courier>,
        locks: Arc<FeedLockRegistry>,
    ) -> Self {
        Self {
            db,
            source,
            courier,
            locks,
        }
    }

    /// Register a feed under the title its document announces.
    pub async fn add_feed(&self, url: &str) -> Result<String, FeedError> {
        let parsed = self.source.fetch(url).await?;
        let title = if parsed.title.is_empty() {
            url.to_string()
        } else {
            parsed.title
        };
        self.db.feeds().add(url, &title).await?;
        info!(url, title = %title, "Feed added");
        Ok(title)
    }

    pub async fn remove_feed(&self, url: &str) -> Result<(), FeedError> {
        self.db.feeds().remove(url).await?;
        info!(url, "Feed removed");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<FeedRecord>, FeedError> {
        Ok(self.db.feeds().list().await?)
    }

    /// Refresh one feed, unless a cycle for it is already running.
    pub async fn refresh(&self, url: &str) -> Result<CycleOutcome, FeedError> {
        let Some(_guard) = self.locks.try_lock(url) else {
            debug!(url, "Feed refresh already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let parsed = self.source.fetch(url).await?;
        let mut new_items = 0;

        for item in parsed.items {
            if item.guid.is_empty() || item.link.is_empty() {
                warn!(url, guid = %item.guid, "Feed item without guid or link");
                continue;
            }
            if self.db.feeds().item_exists(url, &item.guid).await? {
                continue;
            }

            let record = FeedItemRecord {
                feed_url: url.to_string(),
                guid: item.guid,
                title: item.title,
                link: item.link,
                image_url: item.image_url,
                image_title: item.image_title,
                description: item
                    .description
                    .map(|d| html_escape::encode_text(&d).into_owned()),
                feed_title: parsed.title.clone(),
            };

            match self.db.feeds().insert_item(&record).await {
                Ok(true) => {
                    new_items += 1;
                    if let Err(e) = self.courier.broadcast(&news_text(&record)).await {
                        error!(url, guid = %record.guid, error = %e, "Failed to broadcast news");
                    }
                }
                Ok(false) => {}
                Err(e) => error!(url, guid = %record.guid, error = %e, "Failed to store news"),
            }
        }

        Ok(CycleOutcome::Completed { new_items })
    }

    async fn refresh_logged(&self, url: &str) {
        match self.refresh(url).await {
            Ok(CycleOutcome::Skipped) => crate::metrics::record_feed_cycle("skipped", 0),
            Ok(CycleOutcome::Completed { new_items }) => {
                crate::metrics::record_feed_cycle("completed", new_items);
                if new_items > 0 {
                    info!(new_items, "Feed refreshed");
                }
            }
            Err(e) => {
                crate::metrics::record_feed_cycle("failed", 0);
                warn!(error = %e, "Feed refresh failed");
            }
        }
    }

    /// Start one refresh task per registered feed.
    pub async fn run_round(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, FeedError> {
        let feeds = self.db.feeds().list().await?;
        Ok(feeds
            .into_iter()
            .map(|feed| {
                let ingestion = Arc::clone(self);
                let span = crate::telemetry::spans::feed(&feed.url);
                tokio::spawn(
                    async move { ingestion.refresh_logged(&feed.url).await }.instrument(span),
                )
            })
            .collect())
    }

    /// Poll every feed each `period`, forever.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = self.run_round().await {
                    error!(error = %e, "Failed to load feeds");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{courier, group};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StaticSource {
        feeds: Mutex<HashMap<String, ParsedFeed>>,
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl StaticSource {
        fn set(&self, url: &str, feed: ParsedFeed) {
            self.feeds.lock().insert(url.to_string(), feed);
        }
    }

    #[async_trait]
    impl FeedSource for StaticSource {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.feeds
                .lock()
                .get(url)
                .cloned()
                .ok_or(FeedError::Status(404))
        }
    }

    fn item(guid: &str, link: &str) -> ParsedItem {
        ParsedItem {
            guid: guid.to_string(),
            title: format!("Post {guid}"),
            link: link.to_string(),
            ..Default::default()
        }
    }

    const URL: &str = "https://example.org/rss";

    async fn setup(
        source: Arc<StaticSource>,
    ) -> (
        Database,
        Arc<crate::telegram::fake::FakeMessenger>,
        Arc<FeedIngestion>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let (db, fake, courier) = courier(dir.path()).await;
        db.chats().upsert(&group(-1)).await.unwrap();
        db.chats().upsert(&group(-2)).await.unwrap();
        let ingestion = Arc::new(FeedIngestion::new(
            db.clone(),
            source,
            courier,
            Arc::new(FeedLockRegistry::new()),
        ));
        (db, fake, ingestion, dir)
    }

    #[test]
    fn news_text_format() {
        let mut record = FeedItemRecord {
            feed_url: URL.to_string(),
            guid: "1".to_string(),
            title: "Hello".to_string(),
            link: "https://example.org/1".to_string(),
            image_url: None,
            image_title: None,
            description: None,
            feed_title: "Example".to_string(),
        };
        assert_eq!(news_text(&record), "*Example*\n[Hello](https://example.org/1)");

        record.image_url = Some("https://example.org/1.png".to_string());
        record.image_title = Some("cover".to_string());
        assert_eq!(
            news_text(&record),
            "*Example*\n[Hello](https://example.org/1)\n[cover](https://example.org/1.png)"
        );
    }

    #[tokio::test]
    async fn ingesting_twice_broadcasts_once() {
        let source = Arc::new(StaticSource::default());
        source.set(
            URL,
            ParsedFeed {
                title: "Example".to_string(),
                items: vec![
                    item("a", "https://example.org/a"),
                    item("b", "https://example.org/b"),
                    item("", "https://example.org/no-guid"),
                    item("c", ""),
                ],
            },
        );
        let (db, fake, ingestion, _dir) = setup(source).await;

        assert_eq!(
            ingestion.refresh(URL).await.unwrap(),
            CycleOutcome::Completed { new_items: 2 }
        );
        assert_eq!(
            ingestion.refresh(URL).await.unwrap(),
            CycleOutcome::Completed { new_items: 0 }
        );

        // two items to two chats
        assert_eq!(fake.sent().len(), 4);
        assert_eq!(db.feeds().item_count(URL).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn overlapping_refresh_is_skipped() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let source = Arc::new(StaticSource {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        source.set(URL, ParsedFeed::default());
        let (_db, _fake, ingestion, _dir) = setup(source).await;

        let first = {
            let ingestion = Arc::clone(&ingestion);
            tokio::spawn(async move { ingestion.refresh(URL).await.unwrap() })
        };
        while !ingestion.locks.is_locked(URL) {
            tokio::task::yield_now().await;
        }

        assert_eq!(ingestion.refresh(URL).await.unwrap(), CycleOutcome::Skipped);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), CycleOutcome::Completed { new_items: 0 });
        assert!(!ingestion.locks.is_locked(URL));
    }

    #[tokio::test]
    async fn failed_fetch_releases_lock() {
        let source = Arc::new(StaticSource::default());
        let (_db, _fake, ingestion, _dir) = setup(source).await;

        assert!(ingestion.refresh("https://missing.example/rss").await.is_err());
        assert!(!ingestion.locks.is_locked("https://missing.example/rss"));
    }

    #[tokio::test]
    async fn add_remove_list() {
        let source = Arc::new(StaticSource::default());
        source.set(
            URL,
            ParsedFeed {
                title: "Example".to_string(),
                items: Vec::new(),
            },
        );
        let (_db, _fake, ingestion, _dir) = setup(source).await;

        assert_eq!(ingestion.add_feed(URL).await.unwrap(), "Example");
        assert!(matches!(
            ingestion.add_feed(URL).await,
            Err(FeedError::Db(DbError::AlreadyExists(_)))
        ));
        assert_eq!(ingestion.list().await.unwrap().len(), 1);

        ingestion.remove_feed(URL).await.unwrap();
        assert!(matches!(
            ingestion.remove_feed(URL).await,
            Err(FeedError::Db(DbError::NotFound(_)))
        ));
    }
}
