//! Repository for per-user flood levels.

use super::DbError;
use sqlx::SqlitePool;

/// Repository for flood level operations.
pub struct FloodRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FloodRepository<'a> {
    /// Create a new flood level repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Current level of a user; 0 when no row exists.
    pub async fn level(&self, user_id: i64) -> Result<i64, DbError> {
        let level: Option<i64> =
            sqlx::query_scalar("SELECT level FROM flood_levels WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;

        Ok(level.unwrap_or(0))
    }

    /// Add one to a user's level and return the new value.
    ///
    /// A missing row is created at 1. The read-modify-write happens inside a
    /// single statement, so concurrent increments never lose an update.
    pub async fn increment(&self, user_id: i64) -> Result<i64, DbError> {
        let level: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO flood_levels (user_id, level) VALUES (?, 1)
            ON CONFLICT(user_id) DO UPDATE SET level = level + 1
            RETURNING level
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(level)
    }

    /// Set a user's level to 0.
    pub async fn reset(&self, user_id: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO flood_levels (user_id, level) VALUES (?, 0)
            ON CONFLICT(user_id) DO UPDATE SET level = 0
            "#,
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
