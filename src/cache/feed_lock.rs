//! Per-feed "refresh in progress" flags.
//!
//! A slow feed must not be fetched again by the next polling round while
//! the previous cycle is still running. Each cycle takes the feed's flag
//! with [`FeedLockRegistry::try_lock`] and skips the feed if it is taken.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of feed URLs with a cycle in flight.
#[derive(Debug, Default)]
pub struct FeedLockRegistry {
    held: Mutex<HashSet<String>>,
}

impl FeedLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag for `url`. Returns `false` if it is already held.
    pub fn try_acquire(&self, url: &str) -> bool {
        self.held.lock().insert(url.to_string())
    }

    /// Clear the flag for `url`, whoever holds it.
    pub fn release(&self, url: &str) {
        self.held.lock().remove(url);
    }

    pub fn is_locked(&self, url: &str) -> bool {
        self.held.lock().contains(url)
    }

    /// Take the flag for `url` for as long as the returned guard lives.
    pub fn try_lock(self: &Arc<Self>, url: &str) -> Option<FeedLockGuard> {
        self.try_acquire(url).then(|| FeedLockGuard {
            registry: Arc::clone(self),
            url: url.to_string(),
        })
    }
}

/// Releases its feed's flag when dropped.
#[derive(Debug)]
pub struct FeedLockGuard {
    registry: Arc<FeedLockRegistry>,
    url: String,
}

impl FeedLockGuard {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for FeedLockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_until_release() {
        let locks = FeedLockRegistry::new();
        assert!(locks.try_acquire("a"));
        assert!(!locks.try_acquire("a"));
        assert!(locks.try_acquire("b"));
        locks.release("a");
        assert!(locks.try_acquire("a"));
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = Arc::new(FeedLockRegistry::new());
        {
            let guard = locks.try_lock("a").unwrap();
            assert_eq!(guard.url(), "a");
            assert!(locks.try_lock("a").is_none());
        }
        assert!(!locks.is_locked("a"));
    }

    #[test]
    fn guard_releases_on_panic() {
        let locks = Arc::new(FeedLockRegistry::new());
        let inner = Arc::clone(&locks);
        let result = std::thread::spawn(move || {
            let _guard = inner.try_lock("a").unwrap();
            panic!("cycle failed");
        })
        .join();
        assert!(result.is_err());
        assert!(!locks.is_locked("a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_has_one_winner() {
        let locks = Arc::new(FeedLockRegistry::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    locks.try_acquire("https://example.org/rss")
                })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
