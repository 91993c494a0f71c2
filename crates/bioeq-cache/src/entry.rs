//! Cache entries with creation and expiry timestamps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Saturates instead of failing for durations chrono cannot represent.
pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, payload: T, ttl: Duration) -> Self {
        Self::created_at(key, payload, ttl, Utc::now())
    }

    pub fn created_at(key: impl Into<String>, payload: T, ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = now.checked_add_signed(to_chrono(ttl)).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { key: key.into(), payload, created_at: now, expires_at }
    }

    /// Age at `now`; zero if the clock went backwards.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }

    /// Strictly younger than `max_age`.
    pub fn is_fresh_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) < to_chrono(max_age)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
