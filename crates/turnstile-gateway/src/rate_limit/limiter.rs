//! Tiered rate limiter.

use super::store::{BucketKey, BucketStore};
use super::types::{Admission, KeyStrategy, Tier, Verdict};
use crate::config::RateLimitConfig;
use crate::routing::RouteClass;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("unknown rate limit tier '{0}'")]
    UnknownTier(String),
}

/// What a tier's key strategy may draw on.
#[derive(Debug, Clone, Copy)]
pub struct RateSubject<'a> {
    pub client: &'a str,
    pub route: &'a str,
    pub class: RouteClass,
}

impl RateSubject<'_> {
    fn key_for(&self, strategy: KeyStrategy) -> String {
        match strategy {
            KeyStrategy::ClientIp => self.client.to_string(),
            KeyStrategy::RouteClass => self.class.as_str().to_string(),
            KeyStrategy::Route => self.route.to_string(),
            KeyStrategy::Composite => format!("{}|{}", self.client, self.route),
            KeyStrategy::Global => "*".to_string(),
        }
    }
}

/// Token-bucket rate limiter with named tiers.
pub struct RateLimiter {
    tiers: HashMap<String, Tier>,
    store: BucketStore,
    idle_eviction: Duration,
    max_tracked_keys: usize,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(tiers: impl IntoIterator<Item = Tier>) -> Self {
        Self {
            tiers: tiers.into_iter().map(|t| (t.name.clone(), t)).collect(),
            store: BucketStore::new(),
            idle_eviction: Duration::from_secs(300),
            max_tracked_keys: 100_000,
            checks: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut limiter = Self::new(config.tiers.iter().map(Tier::from));
        limiter.idle_eviction = Duration::from_secs(config.idle_eviction_secs);
        limiter.max_tracked_keys = config.max_tracked_keys;
        limiter
    }

    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.get(name)
    }

    /// Check one tier for `key`.
    pub fn admit(&self, tier: &str, key: &str, cost: f64) -> Result<Admission, RateLimitError> {
        self.admit_at(tier, key, cost, Instant::now())
    }

    pub fn admit_at(
        &self,
        tier: &str,
        key: &str,
        cost: f64,
        now: Instant,
    ) -> Result<Admission, RateLimitError> {
        let definition = self
            .tiers
            .get(tier)
            .ok_or_else(|| RateLimitError::UnknownTier(tier.to_string()))?;

        self.checks.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .store
            .check_and_consume(&BucketKey::new(tier, key), definition, cost, now))
    }

    /// Check every applicable tier; the request passes only if all admit.
    pub fn admit_request(
        &self,
        tiers: &[String],
        subject: &RateSubject<'_>,
        cost: f64,
    ) -> Result<Verdict, RateLimitError> {
        self.admit_request_at(tiers, subject, cost, Instant::now())
    }

    /// Tiers are visited in name order and every one is charged, so the
    /// reported delay (the smallest among failing tiers, ties broken by name)
    /// does not depend on configuration order or scheduling.
    pub fn admit_request_at(
        &self,
        tiers: &[String],
        subject: &RateSubject<'_>,
        cost: f64,
        now: Instant,
    ) -> Result<Verdict, RateLimitError> {
        let ordered: BTreeSet<&str> = tiers.iter().map(String::as_str).collect();
        let mut rejection: Option<(Duration, &str)> = None;

        for name in ordered {
            let strategy = self
                .tiers
                .get(name)
                .map(|t| t.key)
                .ok_or_else(|| RateLimitError::UnknownTier(name.to_string()))?;

            let key = subject.key_for(strategy);
            if let Admission::Rejected { retry_after } = self.admit_at(name, &key, cost, now)? {
                debug!(tier = name, key = %key, ?retry_after, "Tier rejected request");
                let better = match rejection {
                    Some((current, _)) => retry_after < current,
                    None => true,
                };
                if better {
                    rejection = Some((retry_after, name));
                }
            }
        }

        Ok(match rejection {
            Some((retry_after, tier)) => Verdict::Rejected {
                tier: tier.to_string(),
                retry_after,
            },
            None => Verdict::Admitted,
        })
    }

    /// Number of bucket checks performed so far.
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Evict idle buckets and enforce the key cap.
    pub fn sweep(&self, now: Instant) -> usize {
        self.store
            .sweep(now, self.idle_eviction, self.max_tracked_keys)
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            // A zero period makes `interval` panic.
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep(Instant::now());
            }
        })
    }
}
