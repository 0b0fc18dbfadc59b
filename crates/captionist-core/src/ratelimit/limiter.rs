//! Per-user token bucket rate limiter.
//!
//! Each user gets a bucket holding up to `bucket_size` tokens, refilled
//! continuously at `refill_rate` tokens per second. A request costs one token.
//! Buckets are created lazily at full capacity and live for the life of the
//! process.
//!
//! All buckets sit behind a single mutex. Refill, compare, and debit happen in
//! one critical section, so two callers can never both spend the last token.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::CaptionistError;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    /// Tokens available at `now`, capped at capacity.
    fn refilled(&self, now: Instant, capacity: f64, refill_rate: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * refill_rate).min(capacity)
    }
}

/// Token bucket rate limiter keyed by user id.
pub struct RateLimiter<C: Clock = SystemClock> {
    bucket_size: u32,
    refill_rate: f64,
    clock: C,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter backed by the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with an explicit time source.
    pub fn with_clock(config: &RateLimitConfig, clock: C) -> Self {
        Self {
            bucket_size: config.bucket_size,
            refill_rate: config.refill_rate,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    /// Spend one token for `user_id` if available.
    pub fn is_allowed(&self, user_id: &str) -> bool {
        let capacity = f64::from(self.bucket_size);
        let mut buckets = self.lock();
        let now = self.clock.now();

        let bucket = buckets.entry(user_id.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        bucket.tokens = bucket.refilled(now, capacity, self.refill_rate);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            tracing::debug!(user_id, tokens = bucket.tokens, "Rate limit hit");
            false
        }
    }

    /// Like [`is_allowed`](Self::is_allowed), but as a `Result` for `?` chains.
    pub fn check(&self, user_id: &str) -> Result<(), CaptionistError> {
        if self.is_allowed(user_id) {
            Ok(())
        } else {
            Err(CaptionistError::RateLimited {
                user_id: user_id.to_string(),
            })
        }
    }

    /// Whole tokens currently available, without spending any.
    ///
    /// Unseen users report a full bucket and no bucket is created for them.
    pub fn remaining(&self, user_id: &str) -> u32 {
        let capacity = f64::from(self.bucket_size);
        let buckets = self.lock();

        match buckets.get(user_id) {
            Some(bucket) => {
                let tokens = bucket.refilled(self.clock.now(), capacity, self.refill_rate);
                tokens.floor() as u32
            }
            None => self.bucket_size,
        }
    }

    /// Forget the user's bucket, as if they had never been seen.
    pub fn reset(&self, user_id: &str) {
        self.lock().remove(user_id);
    }

    /// Number of users with a live bucket.
    pub fn tracked_users(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        // The map holds plain numbers, so a panic mid-update cannot leave it unusable.
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
