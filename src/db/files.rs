//! Repository for the file id to short name mapping.

use super::DbError;
use sqlx::SqlitePool;

/// Repository for file cache operations.
pub struct FileCacheRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileCacheRepository<'a> {
    /// Create a new file cache repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Short name stored for a file id.
    pub async fn get(&self, file_id: &str) -> Result<Option<String>, DbError> {
        let name = sqlx::query_scalar("SELECT file_name FROM file_cache WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(name)
    }

    /// Store a mapping. Returns `false` if the id was already mapped; the
    /// existing name is kept.
    pub async fn insert(&self, file_id: &str, file_name: &str) -> Result<bool, DbError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO file_cache (file_id, file_name) VALUES (?, ?)")
                .bind(file_id)
                .bind(file_name)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Every stored mapping, for warming the in-memory cache.
    pub async fn load_all(&self) -> Result<Vec<(String, String)>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT file_id, file_name FROM file_cache")
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }
}
