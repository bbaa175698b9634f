//! Token bucket rate limiter
//!
//! Shared by the RPC layer (reject when empty) and the geocoder adapter
//! (wait for the next token). The lock is never held across an await.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Rate limiter using the token bucket algorithm
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    max_tokens: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_rate` - Tokens added per second
    ///
    /// # Example
    /// Allow 100 requests/sec with burst of 200:
    /// `RateLimiter::new(200, 100)`
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        let max_tokens = max_tokens.max(1) as f64;
        Self::with_rate(max_tokens, refill_rate.max(1) as f64)
    }

    /// At most one call per `interval`, no burst.
    /// A zero interval still allows one call per millisecond.
    pub fn per_interval(interval: Duration) -> Self {
        let secs = interval.as_secs_f64().max(0.001);
        Self::with_rate(1.0, 1.0 / secs)
    }

    fn with_rate(max_tokens: f64, refill_per_sec: f64) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_per_sec,
        }
    }

    /// Take one token if available, otherwise report how long until one is.
    fn try_take(&self) -> Result<(), Duration> {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }

    /// Check if request is allowed (consumes 1 token)
    ///
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self) -> bool {
        self.try_take().is_ok()
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_take() {
            tracing::debug!("Rate limiting: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Get remaining tokens (for monitoring)
    pub fn remaining(&self) -> f64 {
        match self.bucket.lock() {
            Ok(bucket) => bucket.tokens,
            Err(poisoned) => poisoned.into_inner().tokens,
        }
    }
}
