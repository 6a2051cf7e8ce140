//! Per-village scan cooldown.
//!
//! The cooldown is the only concurrency control preventing duplicate scans
//! for the same village. The trait is the multi-instance seam: the provided
//! in-process map is best-effort within one running instance; a shared
//! deployment backs the same interface with an external store carrying TTL
//! semantics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// TTL-expiring key acquisition keyed by village id.
pub trait CooldownStore: Send + Sync {
    /// Attempt to acquire the cooldown slot for `key`.
    ///
    /// Returns `None` when acquired (the window starts now) or
    /// `Some(remaining)` when a prior acquisition is still inside its
    /// window. Rejected callers are not queued.
    fn try_acquire(&self, key: Uuid, window: Duration) -> Option<Duration>;
}

/// In-process cooldown map. Expired keys are pruned on access; nothing
/// survives a restart.
#[derive(Default)]
pub struct MemoryCooldownStore {
    entries: Mutex<HashMap<Uuid, Instant>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn try_acquire(&self, key: Uuid, window: Duration) -> Option<Duration> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.retain(|_, acquired_at| now.duration_since(*acquired_at) < window);

        if let Some(acquired_at) = entries.get(&key) {
            let elapsed = now.duration_since(*acquired_at);
            if elapsed < window {
                return Some(window - elapsed);
            }
        }

        entries.insert(key, now);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_acquire_succeeds() {
        let store = MemoryCooldownStore::new();
        let key = Uuid::new_v4();

        assert!(store.try_acquire(key, Duration::from_secs(600)).is_none());
    }

    #[test]
    fn test_second_acquire_inside_window_rejected() {
        let store = MemoryCooldownStore::new();
        let key = Uuid::new_v4();
        let window = Duration::from_secs(600);

        assert!(store.try_acquire(key, window).is_none());
        let remaining = store.try_acquire(key, window);
        assert!(remaining.is_some());
        assert!(remaining.unwrap() <= window);
    }

    #[test]
    fn test_different_keys_independent() {
        let store = MemoryCooldownStore::new();
        let window = Duration::from_secs(600);

        assert!(store.try_acquire(Uuid::new_v4(), window).is_none());
        assert!(store.try_acquire(Uuid::new_v4(), window).is_none());
    }

    #[test]
    fn test_acquire_after_window_expires() {
        let store = MemoryCooldownStore::new();
        let key = Uuid::new_v4();
        let window = Duration::from_millis(10);

        assert!(store.try_acquire(key, window).is_none());
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.try_acquire(key, window).is_none());
    }

    #[test]
    fn test_expired_keys_pruned() {
        let store = MemoryCooldownStore::new();
        let window = Duration::from_millis(5);

        for _ in 0..10 {
            store.try_acquire(Uuid::new_v4(), window);
        }
        std::thread::sleep(Duration::from_millis(10));

        // Any access prunes the expired entries.
        store.try_acquire(Uuid::new_v4(), Duration::from_secs(600));
        let entries = store.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
    }
}
