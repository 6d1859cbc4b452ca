//! Remote file id → local short name.
//!
//! A short name is the file's path relative to the static directory, as
//! reported by the platform (e.g. `photos/file_12.jpg`). It doubles as the
//! URL path under `/static` in the web view.
//!
//! Lookups go memory → database → platform. Mappings never change once
//! stored: the first name recorded for an id wins, in memory and on disk.

use crate::db::{Database, DbError};
use crate::media::MediaError;
use crate::telegram::Messenger;
use chatlog_proto::File;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-memory view of the `file_cache` table.
pub struct FileNameCache {
    db: Database,
    messenger: Arc<dyn Messenger>,
    names: DashMap<String, String>,
}

impl FileNameCache {
    pub fn new(db: Database, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            db,
            messenger,
            names: DashMap::new(),
        }
    }

    /// Load every stored mapping into memory. Returns how many were loaded.
    pub async fn warm(&self) -> Result<usize, DbError> {
        let rows = self.db.files().load_all().await?;
        let count = rows.len();
        for (file_id, file_name) in rows {
            self.names.entry(file_id).or_insert(file_name);
        }
        debug!(count, "File name cache warmed");
        Ok(count)
    }

    /// Memory-only lookup.
    pub fn cached(&self, file_id: &str) -> Option<String> {
        self.names.get(file_id).map(|name| name.value().clone())
    }

    /// Memory, then database. A database hit is copied into memory.
    pub async fn lookup(&self, file_id: &str) -> Result<Option<String>, DbError> {
        if let Some(name) = self.cached(file_id) {
            crate::metrics::record_file_cache("memory");
            return Ok(Some(name));
        }

        let stored = self.db.files().get(file_id).await?;
        if let Some(name) = &stored {
            crate::metrics::record_file_cache("store");
            self.names
                .entry(file_id.to_string())
                .or_insert_with(|| name.clone());
        }
        Ok(stored)
    }

    /// Store a mapping unless one already exists. Returns the name in effect.
    pub async fn remember(&self, file_id: &str, file_name: &str) -> Result<String, DbError> {
        self.db.files().insert(file_id, file_name).await?;
        let name = self
            .names
            .entry(file_id.to_string())
            .or_insert_with(|| file_name.to_string())
            .value()
            .clone();
        Ok(name)
    }

    /// Short name for a file whose metadata is already known.
    ///
    /// Falls back to the metadata's remote path, which is then remembered.
    pub async fn short_name_with(&self, file_id: &str, meta: &File) -> Result<String, MediaError> {
        match self.lookup(file_id).await {
            Ok(Some(name)) => return Ok(name),
            Ok(None) => {}
            Err(e) => warn!(file_id, error = %e, "File cache lookup failed"),
        }

        let remote = meta
            .file_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MediaError::Unresolved(file_id.to_string()))?;
        crate::metrics::record_file_cache("remote");

        match self.remember(file_id, remote).await {
            Ok(name) => Ok(name),
            Err(e) => {
                warn!(file_id, error = %e, "Failed to store file name");
                Ok(remote.to_string())
            }
        }
    }

    /// Short name for a file id: memory, then database, then the platform.
    pub async fn short_name(&self, file_id: &str) -> Result<String, MediaError> {
        if let Ok(Some(name)) = self.lookup(file_id).await {
            return Ok(name);
        }
        let meta = self.messenger.get_file(file_id).await?;
        self.short_name_with(file_id, &meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::fake::FakeMessenger;

    async fn setup() -> (Database, Arc<FakeMessenger>, FileNameCache) {
        let db = Database::new(":memory:").await.unwrap();
        let fake = Arc::new(FakeMessenger::new());
        let cache = FileNameCache::new(db.clone(), fake.clone());
        (db, fake, cache)
    }

    #[tokio::test]
    async fn resolves_remotely_then_remembers() {
        let (db, fake, cache) = setup().await;
        fake.add_file("f1", "photos/file_1.jpg", b"jpeg");

        assert_eq!(cache.short_name("f1").await.unwrap(), "photos/file_1.jpg");
        assert_eq!(cache.cached("f1").as_deref(), Some("photos/file_1.jpg"));
        assert_eq!(
            db.files().get("f1").await.unwrap().as_deref(),
            Some("photos/file_1.jpg")
        );
    }

    #[tokio::test]
    async fn store_hit_warms_memory() {
        let (db, _fake, cache) = setup().await;
        db.files().insert("f2", "voice/file_2.oga").await.unwrap();

        assert_eq!(cache.cached("f2"), None);
        assert_eq!(cache.short_name("f2").await.unwrap(), "voice/file_2.oga");
        assert_eq!(cache.cached("f2").as_deref(), Some("voice/file_2.oga"));
    }

    #[tokio::test]
    async fn first_name_wins() {
        let (_db, _fake, cache) = setup().await;
        assert_eq!(cache.remember("f3", "a.jpg").await.unwrap(), "a.jpg");
        assert_eq!(cache.remember("f3", "b.jpg").await.unwrap(), "a.jpg");
    }

    #[tokio::test]
    async fn warm_loads_everything() {
        let (db, _fake, cache) = setup().await;
        db.files().insert("a", "x/a").await.unwrap();
        db.files().insert("b", "x/b").await.unwrap();

        assert_eq!(cache.warm().await.unwrap(), 2);
        assert_eq!(cache.cached("b").as_deref(), Some("x/b"));
    }

    #[tokio::test]
    async fn unknown_file_is_an_error() {
        let (_db, _fake, cache) = setup().await;
        assert!(cache.short_name("nope").await.is_err());
    }
}
