// ABOUTME: In-process rate limit counters bounded by an LRU
// ABOUTME: Used in development, tests and as a fallback when Redis is unreachable at startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use account_core::errors::AppResult;
use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use super::{RateLimitStore, WindowHit};

const DEFAULT_MAX_KEYS: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    closes_at: Instant,
}

/// Fixed-window counters held in process memory
///
/// Counters are not shared between instances. When more than `max_keys`
/// windows are open the least recently used one is dropped, which resets that
/// caller's budget.
#[derive(Clone)]
pub struct InMemoryStore {
    windows: Arc<RwLock<LruCache<String, Window>>>,
}

impl InMemoryStore {
    /// Store tracking at most `max_keys` open windows
    #[must_use]
    pub fn new(max_keys: usize) -> Self {
        let capacity = NonZeroUsize::new(max_keys).unwrap_or(DEFAULT_MAX_KEYS);
        Self {
            windows: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of windows currently tracked
    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Whether no windows are tracked
    pub async fn is_empty(&self) -> bool {
        self.windows.read().await.is_empty()
    }
}

fn remaining_secs(closes_at: Instant, now: Instant) -> u64 {
    let left = closes_at.saturating_duration_since(now);
    // Round up so a window with 200ms left still reports 1 second
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit> {
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let current = match windows.get_mut(key) {
            Some(open) if open.closes_at > now => {
                open.count += 1;
                *open
            }
            _ => {
                let fresh = Window {
                    count: 1,
                    closes_at: now + window,
                };
                windows.put(key.to_owned(), fresh);
                fresh
            }
        };

        Ok(WindowHit {
            count: current.count,
            ttl_secs: remaining_secs(current.closes_at, now),
        })
    }

    async fn reset(&self, key: &str) -> AppResult<()> {
        self.windows.write().await.pop(key);
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_within_window() {
        let store = InMemoryStore::new(10);
        let first = store.hit("k", Duration::from_secs(60)).await.unwrap();
        let second = store.hit("k", Duration::from_secs(60)).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert!(second.ttl_secs <= 60 && second.ttl_secs > 0);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let store = InMemoryStore::new(10);
        store.hit("k", Duration::from_millis(20)).await.unwrap();
        store.hit("k", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let hit = store.hit("k", Duration::from_millis(20)).await.unwrap();
        assert_eq!(hit.count, 1);
    }

    #[tokio::test]
    async fn test_lru_bound() {
        let store = InMemoryStore::new(2);
        for key in ["a", "b", "c"] {
            store.hit(key, Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(store.len().await, 2);
        // "a" was evicted, so its window starts over
        assert_eq!(
            store.hit("a", Duration::from_secs(60)).await.unwrap().count,
            1
        );
    }

    #[tokio::test]
    async fn test_zero_capacity_uses_default() {
        let store = InMemoryStore::new(0);
        assert!(store.is_empty().await);
        store.hit("k", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
