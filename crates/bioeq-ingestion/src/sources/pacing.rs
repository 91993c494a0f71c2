//! Client-side request pacing.
//!
//! Enforces a fixed minimum interval between outgoing requests to respect a
//! collaborator's quota. Waiting suspends the calling query; nothing runs in
//! the background.

use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

pub struct RequestPacer {
    interval: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl RequestPacer {
    /// A zero interval disables pacing.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(RateLimiter::direct);
        Self { interval: min_interval, limiter }
    }

    /// Pick the interval for a credentialed or anonymous client.
    pub fn for_credentials(has_key: bool, anonymous: Duration, keyed: Duration) -> Self {
        Self::new(if has_key { keyed } else { anonymous })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
