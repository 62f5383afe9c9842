//! Token-bucket admission control, keyed by caller identity

use dashmap::DashMap;
use std::time::Instant;
use tracing::warn;

/// Per-identity bucket state.
///
/// Tokens are real-valued so refill is continuous: a caller slightly under
/// the sustained rate is never starved by integer rounding.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter.
///
/// Allows burst traffic while maintaining the sustained average rate.
/// Buckets are created lazily with full capacity on first sight of an
/// identity, so the initial burst is free. Entries for distinct identities
/// are independent; concurrent checks only contend on the same identity.
pub struct RateLimiter {
    /// Sustained rate in tokens per second.
    rate: f64,
    /// Maximum tokens a bucket can hold.
    burst_size: f64,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    /// Create a limiter admitting `requests_per_minute` sustained with
    /// bursts of up to `burst_size` requests.
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            rate: f64::from(requests_per_minute) / 60.0,
            burst_size: f64::from(burst_size.max(1)),
            buckets: DashMap::new(),
        }
    }

    /// Check whether a request from `identity` is admitted.
    ///
    /// Refill is applied before the comparison and the updated token count
    /// is persisted on both outcomes, so `retry_after` stays consistent
    /// with the bucket's continuous-refill semantics.
    pub fn check(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| Bucket {
                tokens: self.burst_size,
                last_refill: now,
            });

        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.rate).min(self.burst_size);
        entry.last_refill = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            warn!(identity = %identity, "Rate limit exceeded");
            false
        }
    }

    /// Seconds until the next request from `identity` would be admitted.
    ///
    /// Returns `0.0` if a request would currently be allowed.
    pub fn retry_after(&self, identity: &str) -> f64 {
        let Some(mut entry) = self.buckets.get_mut(identity) else {
            // Never seen: a fresh bucket is full.
            return 0.0;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.rate).min(self.burst_size);
        entry.last_refill = now;

        if entry.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - entry.tokens) / self.rate
        }
    }

    /// Number of distinct identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }
}
