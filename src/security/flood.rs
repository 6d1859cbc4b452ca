//! Flood moderation: accusation, warning, expulsion.
//!
//! Members call someone a flooder by replying `/flood` to one of their
//! messages. Every accepted accusation raises the target's flood level by
//! one; when it reaches the configured maximum the target is kicked and the
//! level starts over at zero.
//!
//! ```text
//! Clean ──accuse──▶ Warned(1) ──accuse──▶ ... ──accuse (level ≥ max)──▶ kick, reset ──▶ Clean
//! ```
//!
//! One accuser may only accuse the same target once per cooldown window;
//! that window is tracked by [`TimedAbuseCache`].

use crate::db::Database;
use crate::error::BotError;
use crate::security::abuse_cache::{AbuseCheck, TimedAbuseCache, now_ms};
use crate::telegram::Messenger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one accusation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodOutcome {
    /// The accuser pointed at themself. Nothing changed.
    SelfAccusation,
    /// The accuser pointed at the bot. Nothing changed.
    BotTarget,
    /// The accuser already accused this target recently. Nothing changed.
    Cooldown { remaining: Duration },
    /// The accusation was counted.
    Warned { level: i64, attempts_left: i64 },
    /// The level reached the maximum; a kick was attempted and the level reset.
    Expelled { kicked: bool },
}

impl FloodOutcome {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FloodOutcome::SelfAccusation => "self",
            FloodOutcome::BotTarget => "bot",
            FloodOutcome::Cooldown { .. } => "cooldown",
            FloodOutcome::Warned { .. } => "warned",
            FloodOutcome::Expelled { .. } => "expelled",
        }
    }
}

/// The flood moderation state machine.
pub struct FloodEngine {
    db: Database,
    messenger: Arc<dyn Messenger>,
    abuse: Arc<TimedAbuseCache>,
    bot_id: i64,
    max_level: i64,
}

impl FloodEngine {
    pub fn new(
        db: Database,
        messenger: Arc<dyn Messenger>,
        abuse: Arc<TimedAbuseCache>,
        bot_id: i64,
        max_level: i64,
    ) -> Self {
        Self {
            db,
            messenger,
            abuse,
            bot_id,
            max_level,
        }
    }

    pub fn max_level(&self) -> i64 {
        self.max_level
    }

    /// Handle `accuser` calling `accused` a flooder in `chat_id`.
    pub async fn accuse(
        &self,
        chat_id: i64,
        accused: i64,
        accuser: i64,
    ) -> Result<FloodOutcome, BotError> {
        self.accuse_at(chat_id, accused, accuser, now_ms()).await
    }

    /// [`accuse`](Self::accuse) at an explicit time, in Unix milliseconds.
    pub async fn accuse_at(
        &self,
        chat_id: i64,
        accused: i64,
        accuser: i64,
        now_ms: i64,
    ) -> Result<FloodOutcome, BotError> {
        if accused == self.bot_id {
            return Ok(self.finish(FloodOutcome::BotTarget));
        }
        if accused == accuser {
            return Ok(self.finish(FloodOutcome::SelfAccusation));
        }

        if let AbuseCheck::Active { remaining } =
            self.abuse.check_and_record_at(accused, accuser, now_ms).await
        {
            return Ok(self.finish(FloodOutcome::Cooldown { remaining }));
        }

        let level = self.db.flood().increment(accused).await.map_err(|e| {
            BotError::Transient(format!("failed to raise flood level of {accused}: {e}"))
        })?;

        if level < self.max_level {
            return Ok(self.finish(FloodOutcome::Warned {
                level,
                attempts_left: self.max_level - level,
            }));
        }

        let kicked = match self.messenger.kick_member(chat_id, accused).await {
            Ok(()) => {
                info!(chat_id, user_id = accused, level, "Flooder expelled");
                crate::metrics::record_kick();
                true
            }
            Err(e) => {
                warn!(chat_id, user_id = accused, error = %e, "Failed to expel flooder");
                false
            }
        };

        // The level is reset even when the kick failed.
        self.db.flood().reset(accused).await.map_err(|e| {
            BotError::Transient(format!("failed to reset flood level of {accused}: {e}"))
        })?;

        Ok(self.finish(FloodOutcome::Expelled { kicked }))
    }

    fn finish(&self, outcome: FloodOutcome) -> FloodOutcome {
        crate::metrics::record_accusation(outcome.as_str());
        outcome
    }
}
