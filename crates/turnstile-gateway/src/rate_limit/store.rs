//! In-memory bucket storage.

use super::types::{Admission, Tier, TokenBucket};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifies one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub tier: String,
    pub key: String,
}

impl BucketKey {
    pub fn new(tier: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            key: key.into(),
        }
    }
}

/// Token buckets keyed by (tier, key).
///
/// The map is sharded by key hash and each bucket carries its own lock, so a
/// check only holds a shard lock long enough to clone the bucket handle.
pub struct BucketStore {
    buckets: DashMap<BucketKey, Arc<Mutex<TokenBucket>>>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Check and consume `cost` tokens from the bucket, creating it full on
    /// first use.
    pub fn check_and_consume(
        &self,
        key: &BucketKey,
        tier: &Tier,
        cost: f64,
        now: Instant,
    ) -> Admission {
        let bucket = self.bucket(key, tier, now);
        let mut bucket = bucket.lock();
        bucket.try_consume(cost, now)
    }

    fn bucket(&self, key: &BucketKey, tier: &Tier, now: Instant) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.value().clone();
        }

        self.buckets
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(TokenBucket::new(
                    tier.capacity,
                    tier.refill_rate,
                    now,
                )))
            })
            .value()
            .clone()
    }

    /// Snapshot of one bucket.
    pub fn get(&self, key: &BucketKey) -> Option<TokenBucket> {
        self.buckets.get(key).map(|entry| entry.value().lock().clone())
    }

    /// Number of tracked buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop buckets idle for at least `idle` that have refilled completely,
    /// then enforce `max_keys` by evicting the least recently used. Returns
    /// how many were removed.
    pub fn sweep(&self, now: Instant, idle: Duration, max_keys: usize) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let bucket = bucket.lock();
            now.saturating_duration_since(bucket.last_refill()) < idle || !bucket.is_full_at(now)
        });
        let idle_removed = before - self.buckets.len();
        if idle_removed > 0 {
            debug!(removed = idle_removed, "Evicted idle rate limit buckets");
        }

        let current = self.buckets.len();
        if current <= max_keys {
            return idle_removed;
        }

        let mut entries: Vec<(BucketKey, Instant)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().last_refill()))
            .collect();
        entries.sort_by_key(|(_, last)| *last);

        let to_remove = current - max_keys;
        for (key, _) in entries.into_iter().take(to_remove) {
            self.buckets.remove(&key);
        }
        warn!(
            evicted = to_remove,
            max_keys, "Rate limiter reached max tracked keys, evicted least recently used"
        );

        idle_removed + to_remove
    }
}

impl Default for BucketStore {
    fn default() -> Self {
        Self::new()
    }
}
