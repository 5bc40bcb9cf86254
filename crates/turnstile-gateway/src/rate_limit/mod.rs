//! Per-tier token-bucket rate limiting.

pub mod limiter;
pub mod store;
pub mod types;

pub use limiter::{RateLimitError, RateLimiter, RateSubject};
pub use store::{BucketKey, BucketStore};
pub use types::{Admission, KeyStrategy, Tier, TokenBucket, Verdict};
