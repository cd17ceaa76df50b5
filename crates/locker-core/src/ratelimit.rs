// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic in-memory token-bucket rate limiter (spec §4.9), keyed by
//! `(kind, key, kiosk_id)`. Four independent families share one implementation
//! but are configured with different capacities/refill rates.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which rate-limit family a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Ip,
    Card,
    Locker,
    Device,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Card => "card",
            Self::Locker => "locker",
            Self::Device => "device",
        }
    }
}

/// Capacity and refill rate for one `LimitKind` (spec §4.9 defaults: IP
/// 30/min, card 60/min, locker 6/min, device 1 per 20s).
#[derive(Debug, Clone, Copy)]
pub struct LimitConfig {
    pub capacity: u32,
    pub refill_period: chrono::Duration,
}

impl LimitConfig {
    pub fn per_minute(capacity: u32) -> Self {
        Self { capacity, refill_period: chrono::Duration::seconds(60) }
    }

    pub fn per_seconds(capacity: u32, seconds: i64) -> Self {
        Self { capacity, refill_period: chrono::Duration::seconds(seconds) }
    }
}

/// The full set of family configurations, one `RateLimiter` per deployment.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub ip_per_min: u32,
    pub card_per_min: u32,
    pub locker_per_min: u32,
    pub device_per_20s: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { ip_per_min: 30, card_per_min: 60, locker_per_min: 6, device_per_20s: 1 }
    }
}

impl RateLimitSettings {
    fn config_for(&self, kind: LimitKind) -> LimitConfig {
        match kind {
            LimitKind::Ip => LimitConfig::per_minute(self.ip_per_min),
            LimitKind::Card => LimitConfig::per_minute(self.card_per_min),
            LimitKind::Locker => LimitConfig::per_minute(self.locker_per_min),
            LimitKind::Device => LimitConfig::per_seconds(self.device_per_20s, 20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    kind: LimitKind,
    key: String,
    kiosk_id: String,
}

struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
    last_touched: DateTime<Utc>,
}

/// Outcome of a rate-limit check (§4.9: `{allowed, reason?, retry_after_seconds?}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<f64>,
}

impl LimitDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None, retry_after_seconds: None }
    }

    fn deny(reason: impl Into<String>, retry_after_seconds: f64) -> Self {
        Self { allowed: false, reason: Some(reason.into()), retry_after_seconds: Some(retry_after_seconds) }
    }
}

/// Memory-resident token-bucket limiter. Safe to share across async tasks
/// behind an `Arc`; internal state is guarded by a single `RwLock`.
pub struct RateLimiter {
    settings: RateLimitSettings,
    buckets: RwLock<HashMap<BucketKey, Bucket>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self { settings, buckets: RwLock::new(HashMap::new()) }
    }

    /// Consume one token for `(kind, key, kiosk_id)`, refilling proportionally
    /// to elapsed time since the bucket was last touched.
    pub fn check(&self, kind: LimitKind, key: &str, kiosk_id: &str, now: DateTime<Utc>) -> LimitDecision {
        let config = self.settings.config_for(kind);
        let bucket_key = BucketKey { kind, key: key.to_string(), kiosk_id: kiosk_id.to_string() };

        let mut buckets = self.buckets.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = buckets.entry(bucket_key).or_insert_with(|| Bucket {
            tokens: f64::from(config.capacity),
            last_refill: now,
            last_touched: now,
        });

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        let refill_seconds = config.refill_period.num_milliseconds() as f64 / 1000.0;
        if refill_seconds > 0.0 {
            let refill_rate = f64::from(config.capacity) / refill_seconds;
            bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(f64::from(config.capacity));
        }
        bucket.last_refill = now;
        bucket.last_touched = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            LimitDecision::allow()
        } else {
            let refill_rate = f64::from(config.capacity) / refill_seconds.max(0.001);
            let deficit = 1.0 - bucket.tokens;
            let retry_after = deficit / refill_rate;
            LimitDecision::deny(format!("rate limit exceeded for {}", kind.as_str()), retry_after)
        }
    }

    /// Reset every bucket belonging to `key` across all kinds for `kiosk_id`
    /// (staff action, spec §4.9 — audited by the caller as an Event).
    pub fn reset_key(&self, key: &str, kiosk_id: &str) {
        let mut buckets = self.buckets.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.retain(|bucket_key, _| !(bucket_key.key == key && bucket_key.kiosk_id == kiosk_id));
    }

    /// Drop buckets untouched for over an hour (§4.9).
    pub fn evict_stale(&self, now: DateTime<Utc>) {
        let cutoff = chrono::Duration::hours(1);
        let mut buckets = self.buckets.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.retain(|_, bucket| now - bucket.last_touched < cutoff);
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
