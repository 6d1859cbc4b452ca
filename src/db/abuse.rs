//! Repository for flood accusation records.
//!
//! Each row states that `accuser_id` called `accused_id` a flooder at
//! `created_at_ms`. Rows are only ever inserted and deleted.

use super::DbError;
use sqlx::SqlitePool;

/// A persisted accusation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseRecord {
    pub accused_id: i64,
    pub accuser_id: i64,
    pub created_at_ms: i64,
}

/// Repository for abuse record operations.
pub struct AbuseRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AbuseRepository<'a> {
    /// Create a new abuse record repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an accusation. Duplicates for the same pair are allowed.
    pub async fn insert(&self, record: &AbuseRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO abuse_records (accused_id, accuser_id, created_at_ms)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(record.accused_id)
        .bind(record.accuser_id)
        .bind(record.created_at_ms)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Load every stored accusation.
    pub async fn load_all(&self) -> Result<Vec<AbuseRecord>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT accused_id, accuser_id, created_at_ms FROM abuse_records ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(accused_id, accuser_id, created_at_ms)| AbuseRecord {
                accused_id,
                accuser_id,
                created_at_ms,
            })
            .collect())
    }

    /// Delete the pair's records created at or before `cutoff_ms`.
    pub async fn delete_expired_for_pair(
        &self,
        accused_id: i64,
        accuser_id: i64,
        cutoff_ms: i64,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM abuse_records
            WHERE accused_id = ? AND accuser_id = ? AND created_at_ms <= ?
            "#,
        )
        .bind(accused_id)
        .bind(accuser_id)
        .bind(cutoff_ms)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every record created at or before `cutoff_ms`.
    pub async fn delete_expired(&self, cutoff_ms: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM abuse_records WHERE created_at_ms <= ?")
            .bind(cutoff_ms)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    use super::*;

    fn record(accused_id: i64, accuser_id: i64, created_at_ms: i64) -> AbuseRecord {
        AbuseRecord {
            accused_id,
            accuser_id,
            created_at_ms,
        }
    }

    #[tokio::test]
    async fn expiry_is_scoped_to_the_pair() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.abuse();

        repo.insert(&record(1, 2, 100)).await.unwrap();
        repo.insert(&record(1, 2, 500)).await.unwrap();
        repo.insert(&record(1, 3, 100)).await.unwrap();

        assert_eq!(repo.delete_expired_for_pair(1, 2, 100).await.unwrap(), 1);

        let left = repo.load_all().await.unwrap();
        assert_eq!(left, vec![record(1, 2, 500), record(1, 3, 100)]);
    }

    #[tokio::test]
    async fn sweep_removes_all_old_rows() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.abuse();

        repo.insert(&record(1, 2, 100)).await.unwrap();
        repo.insert(&record(4, 5, 200)).await.unwrap();
        repo.insert(&record(6, 7, 900)).await.unwrap();

        assert_eq!(repo.delete_expired(200).await.unwrap(), 2);
        assert_eq!(repo.load_all().await.unwrap(), vec![record(6, 7, 900)]);
    }
}
