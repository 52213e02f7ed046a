//! # Rate Limiter
//!
//! Token bucket rate limiting driven by a [`TimeSource`], so refill is
//! deterministic under a mock clock.
//!
//! - Tokens are added continuously at `refill_per_sec`
//! - Each request consumes one token
//! - Requests are rejected when the bucket is empty

use crate::entities::Timestamp;
use crate::time::TimeSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Milli-tokens, so sub-token refill accumulates.
    millitokens: u64,
    last_refill: Timestamp,
}

impl Bucket {
    fn full(capacity: u64, now: Timestamp) -> Self {
        Self {
            millitokens: capacity * 1_000,
            last_refill: now,
        }
    }

    fn refill(&mut self, capacity: u64, refill_per_sec: u64, now: Timestamp) {
        let elapsed_ms = now.saturating_sub(self.last_refill);
        // tokens/sec * ms == milli-tokens
        let added = elapsed_ms.saturating_mul(refill_per_sec);
        if added > 0 {
            self.millitokens = (self.millitokens.saturating_add(added)).min(capacity * 1_000);
            self.last_refill = now;
        }
    }

    fn try_take(&mut self) -> bool {
        if self.millitokens >= 1_000 {
            self.millitokens -= 1_000;
            true
        } else {
            false
        }
    }
}

/// Single token bucket.
pub struct RateLimiter {
    capacity: u64,
    refill_per_sec: u64,
    bucket: Mutex<Bucket>,
    time: Arc<dyn TimeSource>,
}

impl RateLimiter {
    /// Bucket holding `capacity` tokens, refilled at `refill_per_sec`.
    pub fn new(capacity: u64, refill_per_sec: u64, time: Arc<dyn TimeSource>) -> Self {
        let now = time.now();
        Self {
            capacity,
            refill_per_sec,
            bucket: Mutex::new(Bucket::full(capacity, now)),
            time,
        }
    }

    /// Consume a token. Returns `false` when rate limited.
    pub fn try_acquire(&self) -> bool {
        let now = self.time.now();
        let mut bucket = self.bucket.lock();
        bucket.refill(self.capacity, self.refill_per_sec, now);
        bucket.try_take()
    }

    /// Whole tokens currently available.
    pub fn available(&self) -> u64 {
        let now = self.time.now();
        let mut bucket = self.bucket.lock();
        bucket.refill(self.capacity, self.refill_per_sec, now);
        bucket.millitokens / 1_000
    }
}

/// One token bucket per key (e.g. per requester id).
///
/// Refill is expressed as a period per token so slow rates such as
/// "one request every 12 seconds" are representable.
pub struct KeyedRateLimiter {
    capacity: u64,
    refill_period_ms: u64,
    buckets: Mutex<HashMap<String, (u64, Timestamp)>>,
    time: Arc<dyn TimeSource>,
}

impl KeyedRateLimiter {
    /// `capacity` burst per key, one token restored every `refill_period_ms`.
    pub fn new(capacity: u64, refill_period_ms: u64, time: Arc<dyn TimeSource>) -> Self {
        Self {
            capacity,
            refill_period_ms: refill_period_ms.max(1),
            buckets: Mutex::new(HashMap::new()),
            time,
        }
    }

    /// Consume a token for `key`. Returns `false` when `key` is rate limited.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = self.time.now();
        let mut buckets = self.buckets.lock();
        let (tokens, last) = buckets
            .entry(key.to_string())
            .or_insert((self.capacity, now));

        let restored = now.saturating_sub(*last) / self.refill_period_ms;
        if restored > 0 {
            *tokens = (*tokens + restored).min(self.capacity);
            *last += restored * self.refill_period_ms;
        }

        if *tokens == 0 {
            return false;
        }
        *tokens -= 1;
        true
    }

    /// Drop buckets that have fully refilled; they carry no state.
    pub fn prune(&self) -> usize {
        let now = self.time.now();
        let full_after = self.capacity * self.refill_period_ms;
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, (_, last)| now.saturating_sub(*last) < full_after);
        before - buckets.len()
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}
