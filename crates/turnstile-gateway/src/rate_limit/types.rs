//! Rate limiting types.

use crate::config::TierConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Strategy for extracting the bucket key of a tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// One bucket per client address.
    #[default]
    ClientIp,
    /// One bucket per route class (public / protected).
    RouteClass,
    /// One bucket per route rule.
    Route,
    /// Client address and route rule combined.
    Composite,
    /// A single bucket shared by every request.
    Global,
}

/// A named rate-limit policy.
#[derive(Debug, Clone)]
pub struct Tier {
    pub name: String,
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Bucket capacity.
    pub capacity: f64,
    pub key: KeyStrategy,
}

impl From<&TierConfig> for Tier {
    fn from(config: &TierConfig) -> Self {
        Self {
            name: config.name.clone(),
            refill_rate: config.rate_per_sec,
            capacity: config.burst,
            key: config.key,
        }
    }
}

/// Outcome of a single bucket check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Admitted { remaining: f64 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Token bucket state for one (tier, key).
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Replenish tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Refill, then take `cost` tokens if available.
    pub fn try_consume(&mut self, cost: f64, now: Instant) -> Admission {
        self.refill(now);

        if self.tokens >= cost {
            self.tokens -= cost;
            Admission::Admitted {
                remaining: self.tokens,
            }
        } else {
            let retry_after = (cost - self.tokens) / self.refill_rate;
            Admission::Rejected {
                retry_after: Duration::try_from_secs_f64(retry_after).unwrap_or(Duration::MAX),
            }
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Whether the bucket would be back at capacity by `now`.
    ///
    /// Only a full bucket can be dropped and later recreated without
    /// handing out tokens that have not accrued yet.
    pub fn is_full_at(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens + elapsed.as_secs_f64() * self.refill_rate >= self.capacity
    }

    /// Last time the bucket was touched.
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}

/// Overall decision for a request subject to several tiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Admitted,
    Rejected {
        /// Tier whose delay was reported.
        tier: String,
        retry_after: Duration,
    },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}
