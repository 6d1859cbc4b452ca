//! Repository for registered feeds and the items already broadcast.

use super::DbError;
use sqlx::SqlitePool;

/// A registered feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub url: String,
    pub name: String,
}

/// A feed item that has been seen (and broadcast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItemRecord {
    pub feed_url: String,
    pub guid: String,
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
    pub image_title: Option<String>,
    pub description: Option<String>,
    pub feed_title: String,
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new feed repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a feed.
    pub async fn add(&self, url: &str, name: &str) -> Result<(), DbError> {
        let result = sqlx::query("INSERT OR IGNORE INTO feeds (url, name) VALUES (?, ?)")
            .bind(url)
            .bind(name)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AlreadyExists(url.to_string()));
        }
        Ok(())
    }

    /// Unregister a feed. Items already seen are kept.
    pub async fn remove(&self, url: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM feeds WHERE url = ?")
            .bind(url)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(url.to_string()));
        }
        Ok(())
    }

    /// All registered feeds, ordered by URL.
    pub async fn list(&self) -> Result<Vec<FeedRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT url, name FROM feeds ORDER BY url")
            .fetch_all(self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(url, name)| FeedRecord { url, name })
            .collect())
    }

    /// Whether an item with this GUID was already seen for the feed.
    pub async fn item_exists(&self, feed_url: &str, guid: &str) -> Result<bool, DbError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM feed_items WHERE feed_url = ? AND guid = ?")
                .bind(feed_url)
                .bind(guid)
                .fetch_optional(self.pool)
                .await?;

        Ok(found.is_some())
    }

    /// Record an item. Returns `true` only if this call inserted the row.
    pub async fn insert_item(&self, item: &FeedItemRecord) -> Result<bool, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO feed_items
                (feed_url, guid, title, link, image_url, image_title, description, feed_title, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.feed_url)
        .bind(&item.guid)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.image_url)
        .bind(&item.image_title)
        .bind(&item.description)
        .bind(&item.feed_title)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of items recorded for a feed.
    pub async fn item_count(&self, feed_url: &str) -> Result<i64, DbError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM feed_items WHERE feed_url = ?")
            .bind(feed_url)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
