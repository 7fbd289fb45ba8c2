//! Request pacing for the generator
//!
//! Shared across requests so concurrent batches stay under one aggregate
//! ceiling. Requests are spaced evenly with no burst allowance.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota,
};
use std::time::Duration;

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct RateLimiter {
    /// `None` when pacing is disabled
    inner: Option<DirectRateLimiter>,
}

impl RateLimiter {
    /// At most `requests_per_second` acquisitions per second.
    ///
    /// A rate that is zero, negative or not finite disables pacing.
    pub fn per_second(requests_per_second: f64) -> Self {
        let quota = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / requests_per_second)
                .ok()
                .and_then(Quota::with_period)
        } else {
            None
        };
        Self {
            inner: quota.map(governor::RateLimiter::direct),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.inner.is_none()
    }

    /// Wait until the caller may issue one request
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("unlimited", &self.is_unlimited())
            .finish()
    }
}
