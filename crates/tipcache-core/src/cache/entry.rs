use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_age;

/// TTL presets, chosen per resource volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// 60s - live scores
    Short,
    /// 5 minutes - predictions and fixtures
    Medium,
    /// 1 hour - reference lists and stats
    Long,
    /// 24 hours
    VeryLong,
    Seconds(u64),
}

impl Ttl {
    pub fn as_secs(&self) -> u64 {
        match self {
            Ttl::Short => 60,
            Ttl::Medium => 300,
            Ttl::Long => 3600,
            Ttl::VeryLong => 86_400,
            Ttl::Seconds(secs) => *secs,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.as_secs().min(i64::MAX as u64) as i64)
    }
}

/// One stored entry, as written to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl CacheEntry {
    pub fn new(key: String, payload: serde_json::Value, now: DateTime<Utc>, ttl: Ttl, tags: &[&str]) -> Self {
        Self {
            key,
            payload,
            stored_at: now,
            expires_at: now + ttl.duration(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A typed cache hit handed back to callers. Owned, so callers can never
/// mutate what the cache holds.
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Only ever true for reads that explicitly allow stale data
    pub expired: bool,
}

impl<T> CachedData<T> {
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        format_age(self.age_minutes(now))
    }
}
