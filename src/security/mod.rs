//! Moderation for chatlogd.
//!
//! - **Abuse cache**: time-windowed accusation records, one window per
//!   (accused, accuser) pair
//! - **Flood engine**: accusation → warning → kick state machine
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                  FloodEngine                   │
//! ├─────────────────┬──────────────┬───────────────┤
//! │ TimedAbuseCache │ flood_levels │   Messenger   │
//! │ RwLock<HashMap> │   (SQLite)   │  kick_member  │
//! └─────────────────┴──────────────┴───────────────┘
//! ```

pub mod abuse_cache;
pub mod flood;

pub use abuse_cache::TimedAbuseCache;
pub use flood::{FloodEngine, FloodOutcome};
