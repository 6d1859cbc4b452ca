//! Time-windowed record of flood accusations.
//!
//! Answers one question: has this accuser already called this user a
//! flooder within the cooldown window, and if so, how long until they may
//! do it again?
//!
//! # Architecture
//!
//! - Loaded from the database on startup
//! - Written through to the database on every new accusation
//! - Expired records are removed lazily when their pair is checked, and in
//!   bulk by a periodic sweep
//!
//! The in-memory index is the source of truth for decisions. Database
//! failures are logged and never block a decision; on restart the index is
//! rebuilt from whatever was persisted.

use crate::db::{AbuseRecord, Database, DbError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// (accused, accuser)
type Pair = (i64, i64);

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Result of [`TimedAbuseCache::check_and_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbuseCheck {
    /// A live accusation exists; nothing was recorded.
    Active { remaining: Duration },
    /// No live accusation existed; a new one was recorded.
    Recorded,
}

/// In-memory accusation index backed by the `abuse_records` table.
pub struct TimedAbuseCache {
    db: Database,
    cooldown_ms: i64,
    index: RwLock<HashMap<Pair, Vec<i64>>>,
}

impl TimedAbuseCache {
    /// Create an empty cache.
    pub fn new(db: Database, cooldown: Duration) -> Self {
        Self {
            db,
            cooldown_ms: cooldown.as_millis() as i64,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Create a cache pre-warmed from the database.
    pub async fn load(db: Database, cooldown: Duration) -> Result<Self, DbError> {
        let records = db.abuse().load_all().await?;
        let cache = Self::new(db, cooldown);
        {
            let mut index = cache.index.write();
            for r in &records {
                index
                    .entry((r.accused_id, r.accuser_id))
                    .or_default()
                    .push(r.created_at_ms);
            }
        }
        debug!(records = records.len(), "Abuse cache loaded");
        Ok(cache)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms as u64)
    }

    /// Drop the pair's expired timestamps and return the smallest live age.
    ///
    /// Returns `(removed, min_live_age)`. Must be called with the write lock held.
    fn purge_pair(
        index: &mut HashMap<Pair, Vec<i64>>,
        pair: Pair,
        now_ms: i64,
        cooldown_ms: i64,
    ) -> (usize, Option<i64>) {
        let Some(stamps) = index.get_mut(&pair) else {
            return (0, None);
        };
        let before = stamps.len();
        stamps.retain(|&created| now_ms - created < cooldown_ms);
        let removed = before - stamps.len();
        let min_age = stamps.iter().map(|&created| now_ms - created).min();
        if stamps.is_empty() {
            index.remove(&pair);
        }
        (removed, min_age)
    }

    async fn delete_expired_pair(&self, pair: Pair, now_ms: i64) {
        let cutoff = now_ms - self.cooldown_ms;
        if let Err(e) = self
            .db
            .abuse()
            .delete_expired_for_pair(pair.0, pair.1, cutoff)
            .await
        {
            warn!(accused = pair.0, accuser = pair.1, error = %e, "Failed to delete expired accusations");
        }
    }

    /// Record an accusation stamped now. Duplicates are allowed.
    pub async fn record_accusation(&self, accused: i64, accuser: i64) -> Result<(), DbError> {
        self.record_accusation_at(accused, accuser, now_ms()).await
    }

    pub async fn record_accusation_at(
        &self,
        accused: i64,
        accuser: i64,
        now_ms: i64,
    ) -> Result<(), DbError> {
        self.index
            .write()
            .entry((accused, accuser))
            .or_default()
            .push(now_ms);

        self.db
            .abuse()
            .insert(&AbuseRecord {
                accused_id: accused,
                accuser_id: accuser,
                created_at_ms: now_ms,
            })
            .await
    }

    /// Whether a live accusation exists for the pair, and the time left
    /// until the youngest one expires.
    ///
    /// Expired records for the pair are removed as a side effect.
    pub async fn query_active(&self, accused: i64, accuser: i64) -> (bool, Duration) {
        self.query_active_at(accused, accuser, now_ms()).await
    }

    pub async fn query_active_at(&self, accused: i64, accuser: i64, now_ms: i64) -> (bool, Duration) {
        let pair = (accused, accuser);
        let (removed, min_age) = {
            let mut index = self.index.write();
            Self::purge_pair(&mut index, pair, now_ms, self.cooldown_ms)
        };

        if removed > 0 {
            self.delete_expired_pair(pair, now_ms).await;
        }

        match min_age {
            Some(age) => (true, Duration::from_millis((self.cooldown_ms - age) as u64)),
            None => (false, Duration::ZERO),
        }
    }

    /// Check for a live accusation and, if there is none, record one.
    ///
    /// The check and the insert happen under a single write lock, so two
    /// concurrent accusations by the same pair cannot both be recorded.
    pub async fn check_and_record(&self, accused: i64, accuser: i64) -> AbuseCheck {
        self.check_and_record_at(accused, accuser, now_ms()).await
    }

    pub async fn check_and_record_at(&self, accused: i64, accuser: i64, now_ms: i64) -> AbuseCheck {
        let pair = (accused, accuser);
        let (removed, outcome) = {
            let mut index = self.index.write();
            let (removed, min_age) = Self::purge_pair(&mut index, pair, now_ms, self.cooldown_ms);
            let outcome = match min_age {
                Some(age) => AbuseCheck::Active {
                    remaining: Duration::from_millis((self.cooldown_ms - age) as u64),
                },
                None => {
                    index.entry(pair).or_default().push(now_ms);
                    AbuseCheck::Recorded
                }
            };
            (removed, outcome)
        };

        if removed > 0 {
            self.delete_expired_pair(pair, now_ms).await;
        }

        if outcome == AbuseCheck::Recorded
            && let Err(e) = self
                .db
                .abuse()
                .insert(&AbuseRecord {
                    accused_id: accused,
                    accuser_id: accuser,
                    created_at_ms: now_ms,
                })
                .await
        {
            warn!(accused, accuser, error = %e, "Failed to persist accusation");
        }

        outcome
    }

    /// Remove every expired record, in memory and in the database.
    ///
    /// Returns the number of in-memory records removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(now_ms()).await
    }

    pub async fn sweep_at(&self, now_ms: i64) -> usize {
        let cooldown_ms = self.cooldown_ms;
        let removed = {
            let mut index = self.index.write();
            let mut removed = 0;
            index.retain(|_, stamps| {
                let before = stamps.len();
                stamps.retain(|&created| now_ms - created < cooldown_ms);
                removed += before - stamps.len();
                !stamps.is_empty()
            });
            removed
        };

        if let Err(e) = self.db.abuse().delete_expired(now_ms - cooldown_ms).await {
            warn!(error = %e, "Failed to sweep expired accusations from database");
        }

        removed
    }

    /// Number of live pairs in memory.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}
