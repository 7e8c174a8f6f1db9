use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::StatsOverview;
use crate::utils::format_age;

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Outcome {
    /// Fetched from the network just now
    Fresh,
    /// Unexpired cache hit
    Cached,
    /// Network failed or was skipped; served from an earlier cache entry
    Stale,
    /// The upstream answered, with nothing in it
    Empty,
    /// Nothing reachable and nothing cached; `data` is the default
    Failed,
}

impl Outcome {
    /// Whether the UI should offer a retry.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Stale)
    }
}

/// Per-call options. Replaces a process-wide force-refresh toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the cache read; the result is still written back
    pub force_refresh: bool,
}

impl FetchOptions {
    pub fn refresh() -> Self {
        Self { force_refresh: true }
    }
}

/// A resource read plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Fetched<T> {
    pub data: T,
    pub outcome: Outcome,
    /// Upstream that produced `data` ("api", a provider name, or "None")
    pub source: String,
    /// When `data` was obtained from upstream
    pub fetched_at: DateTime<Utc>,
    /// Failure reasons collected on the way, oldest first
    pub diagnostics: Vec<String>,
}

impl<T> Fetched<T> {
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        format_age((now - self.fetched_at).num_minutes())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            outcome: self.outcome,
            source: self.source,
            fetched_at: self.fetched_at,
            diagnostics: self.diagnostics,
        }
    }
}

/// A resource type the service can serve: it has a typed-empty default and
/// can tell whether a value carries anything.
pub trait ResourceData: Default {
    fn is_empty(&self) -> bool;
}

impl<T> ResourceData for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<K, V> ResourceData for BTreeMap<K, V> {
    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

impl<T> ResourceData for Option<T> {
    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

impl ResourceData for StatsOverview {
    fn is_empty(&self) -> bool {
        *self == StatsOverview::default()
    }
}

/// What the cache stores for a resource: the data and who served it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CachedPayload<T> {
    pub data: T,
    pub source: String,
}
