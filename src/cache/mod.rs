//! Shared in-process caches.
//!
//! - [`files`]: remote file id → local short name, backed by `file_cache`
//! - [`photos`]: user id → downloaded profile photo
//! - [`feed_lock`]: which feeds have a refresh cycle in flight
//!
//! All of them are built once in `main` and shared through `Arc`. Locks are
//! held only for map access, never across an `.await`.

pub mod feed_lock;
pub mod files;
pub mod photos;

pub use feed_lock::{FeedLockGuard, FeedLockRegistry};
pub use files::FileNameCache;
pub use photos::UserPhotoCache;
