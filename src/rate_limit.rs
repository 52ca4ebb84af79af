//! Per-user token-bucket rate limiting
//!
//! Each user gets a bucket holding up to `burst` tokens that refills at
//! `requests_per_minute / 60` tokens per second. A request consumes one
//! token; an empty bucket rejects the request with a retry hint.
//!
//! Buckets live in a sharded concurrent map so updates for one user never
//! wait on another user's bucket. Buckets idle for longer than the
//! configured TTL are dropped by [`RateLimiter::evict_idle`], which the
//! server runs periodically via [`RateLimiter::spawn_sweeper`].

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    /// Request admitted; `remaining` whole tokens are left
    Allowed {
        /// Tokens left after this request
        remaining: u32,
    },
    /// Request rejected; a token becomes available after `retry_after`
    Limited {
        /// Time until the next token is available
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Returns true when the request was admitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant, per_second: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * per_second).min(capacity);
            self.last_refill = now;
        }
    }
}

/// Thread-safe per-key token bucket limiter
///
/// # Examples
///
/// ```
/// use link_ai::config::RateLimitConfig;
/// use link_ai::rate_limit::RateLimiter;
///
/// let limiter = RateLimiter::new(&RateLimitConfig::default());
/// for _ in 0..5 {
///     assert!(limiter.check("user-1").is_allowed());
/// }
/// assert!(!limiter.check("user-1").is_allowed());
/// assert!(limiter.check("user-2").is_allowed());
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    requests_per_minute: u32,
    capacity: f64,
    refill_per_second: f64,
    bucket_ttl: Duration,
}

impl RateLimiter {
    /// Create a limiter from configuration
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            requests_per_minute: config.requests_per_minute,
            capacity: f64::from(config.burst.max(1)),
            refill_per_second: f64::from(config.requests_per_minute.max(1)) / 60.0,
            bucket_ttl: Duration::from_secs(config.bucket_ttl_seconds),
        }
    }

    /// Configured sustained rate
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Check and consume a token for `key` at the current time
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Check and consume a token for `key` as of `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity, now));

        bucket.refill(now, self.refill_per_second, self.capacity);
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let deficit = 1.0 - bucket.tokens;
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs_f64(deficit / self.refill_per_second),
            }
        }
    }

    /// Drop buckets idle for longer than the TTL; returns how many were removed
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        let ttl = self.bucket_ttl;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < ttl);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of tracked buckets
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until `shutdown` fires
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Rate limiter sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle(Instant::now());
                        if evicted > 0 {
                            tracing::debug!(
                                evicted,
                                remaining = self.tracked_keys(),
                                "Evicted idle rate limit buckets"
                            );
                        }
                    }
                }
            }
        })
    }
}

/// Round a retry hint up to whole seconds, never below one
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs_f64().ceil() as u64;
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rpm: u32, burst: u32, ttl: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            requests_per_minute: rpm,
            burst,
            bucket_ttl_seconds: ttl,
            sweep_interval_seconds: 60,
        })
    }

    #[test]
    fn test_sixth_request_in_a_minute_is_rejected() {
        let limiter = limiter(5, 5, 600);
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(
                limiter.check_at("user-1", t0).is_allowed(),
                "request {} should be allowed",
                i + 1
            );
        }
        assert!(!limiter.check_at("user-1", t0).is_allowed());
    }

    #[test]
    fn test_accepts_again_after_window_resets() {
        let limiter = limiter(5, 5, 600);
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.check_at("user-1", t0);
        }
        assert!(!limiter.check_at("user-1", t0 + Duration::from_secs(5)).is_allowed());

        let after_window = t0 + Duration::from_secs(61);
        for _ in 0..5 {
            assert!(limiter.check_at("user-1", after_window).is_allowed());
        }
    }

    #[test]
    fn test_refills_one_token_per_interval() {
        let limiter = limiter(5, 5, 600);
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.check_at("user-1", t0);
        }
        // 5/min = one token every 12 seconds
        assert!(!limiter.check_at("user-1", t0 + Duration::from_secs(11)).is_allowed());
        assert!(limiter.check_at("user-1", t0 + Duration::from_secs(13)).is_allowed());
        assert!(!limiter.check_at("user-1", t0 + Duration::from_secs(13)).is_allowed());
    }

    #[test]
    fn test_retry_after_reflects_deficit() {
        let limiter = limiter(5, 5, 600);
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.check_at("user-1", t0);
        }
        match limiter.check_at("user-1", t0 + Duration::from_secs(6)) {
            RateLimitDecision::Limited { retry_after } => {
                let secs = retry_after.as_secs_f64();
                assert!((5.9..6.1).contains(&secs), "retry_after was {}", secs);
            }
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = limiter(5, 2, 600);
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).is_allowed());
        assert!(limiter.check_at("a", t0).is_allowed());
        assert!(!limiter.check_at("a", t0).is_allowed());
        assert!(limiter.check_at("b", t0).is_allowed());
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter(5, 3, 600);
        let t0 = Instant::now();
        assert_eq!(
            limiter.check_at("a", t0),
            RateLimitDecision::Allowed { remaining: 2 }
        );
        assert_eq!(
            limiter.check_at("a", t0),
            RateLimitDecision::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn test_evict_idle_drops_only_stale_buckets() {
        let limiter = limiter(5, 5, 60);
        let t0 = Instant::now();
        limiter.check_at("stale", t0);
        limiter.check_at("fresh", t0 + Duration::from_secs(50));

        let evicted = limiter.evict_idle(t0 + Duration::from_secs(61));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_keys(), 1);

        // An evicted user starts over with a full bucket
        for _ in 0..5 {
            assert!(limiter
                .check_at("stale", t0 + Duration::from_secs(62))
                .is_allowed());
        }
    }

    #[test]
    fn test_retry_after_secs_minimum_one() {
        assert_eq!(retry_after_secs(Duration::from_millis(10)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(2500)), 3);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let limiter = Arc::new(limiter(5, 5, 0));
        limiter.check("a");
        let shutdown = CancellationToken::new();
        let handle = limiter
            .clone()
            .spawn_sweeper(Duration::from_millis(10), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(limiter.tracked_keys(), 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .expect("sweeper should not panic");
    }
}
