use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{
    BackendKind, CacheBackend, CacheEntry, CachedData, Clock, MemoryBackend, PersistentBackend,
    SessionBackend, StorageError, SystemClock, Ttl,
};
use crate::config::CacheSettings;

/// Prefix on every key this cache writes; `clear` never touches anything else.
pub const DEFAULT_NAMESPACE: &str = "tipcache:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub requested: BackendKind,
    pub backend: BackendKind,
    pub memory_entries: usize,
    pub backend_entries: usize,
}

impl CacheStats {
    /// The requested backend could not be used and memory took its place
    pub fn is_degraded(&self) -> bool {
        self.requested != self.backend
    }
}

pub struct CacheManager {
    namespace: String,
    requested: BackendKind,
    backend: Box<dyn CacheBackend>,
    shadow: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl CacheManager {
    /// Build the configured backend. Never fails: an unusable backend is
    /// replaced by memory storage and the downgrade is logged.
    pub fn new(settings: &CacheSettings) -> Self {
        let candidate: Result<Box<dyn CacheBackend>, StorageError> = match settings.backend {
            BackendKind::Persistent => match &settings.dir {
                Some(dir) => PersistentBackend::new(dir.clone(), settings.quota_bytes)
                    .map(|b| Box::new(b) as Box<dyn CacheBackend>),
                None => Err(StorageError::Unavailable("no cache directory configured".to_string())),
            },
            BackendKind::Session => {
                SessionBackend::new(settings.quota_bytes).map(|b| Box::new(b) as Box<dyn CacheBackend>)
            }
            BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        };
        let cache = Self::assemble(settings.backend, candidate).with_namespace(&settings.namespace);
        let purged = cache.clear_expired();
        if purged > 0 {
            debug!(purged, "Purged expired cache entries at startup");
        }
        cache
    }

    /// Wrap an existing backend, probing it first like `new` does.
    pub fn with_backend(backend: Box<dyn CacheBackend>) -> Self {
        let kind = backend.kind();
        Self::assemble(kind, Ok(backend))
    }

    fn assemble(requested: BackendKind, candidate: Result<Box<dyn CacheBackend>, StorageError>) -> Self {
        let backend = match candidate.and_then(|backend| backend.probe().map(|_| backend)) {
            Ok(backend) => {
                debug!(backend = %backend.kind(), "Cache backend ready");
                backend
            }
            Err(e) => {
                warn!(requested = %requested, error = %e, "Cache backend unavailable, using memory only");
                Box::new(MemoryBackend::new())
            }
        };
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            requested,
            backend,
            shadow: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn shadow(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.shadow.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    // ===== Reads =====

    /// Payload for `key` if present and unexpired.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_entry(key, false).map(|cached| cached.data)
    }

    /// Like `get`, but also returns expired entries (flagged) for degraded reads.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        self.get_entry(key, true)
    }

    pub fn get_entry<T: DeserializeOwned>(&self, key: &str, allow_stale: bool) -> Option<CachedData<T>> {
        let full = self.full_key(key);
        let now = self.clock.now();
        let entry = self.lookup(&full, allow_stale)?;
        let expired = entry.is_expired(now);
        match serde_json::from_value::<T>(entry.payload) {
            Ok(data) => Some(CachedData {
                data,
                cached_at: entry.stored_at,
                expires_at: entry.expires_at,
                expired,
            }),
            Err(e) => {
                debug!(key, error = %e, "Cached payload does not match requested type");
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }

    fn lookup(&self, full: &str, allow_stale: bool) -> Option<CacheEntry> {
        let now = self.clock.now();
        let shadowed = self.shadow().get(full).cloned();
        if let Some(entry) = shadowed {
            if allow_stale || !entry.is_expired(now) {
                return Some(entry);
            }
        }

        let entry = self.read_backend(full)?;
        if entry.is_expired(now) {
            return allow_stale.then_some(entry);
        }
        // Durable hit: keep a copy in memory for the next read
        self.shadow().insert(full.to_string(), entry.clone());
        Some(entry)
    }

    fn read_backend(&self, full: &str) -> Option<CacheEntry> {
        match self.backend.get(full) {
            Ok(Some(raw)) => match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(key = full, error = %e, "Dropping unreadable cache entry");
                    self.remove_backend(full);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(key = full, error = %e, "Cache backend read failed");
                None
            }
        }
    }

    // ===== Writes =====

    /// Store `value` for `ttl`. A failed durable write is retried once after
    /// purging expired entries; if that fails too the entry is kept in memory.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Ttl, tags: &[&str]) {
        let full = self.full_key(key);
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache payload");
                return;
            }
        };
        let entry = CacheEntry::new(full.clone(), payload, self.clock.now(), ttl, tags);
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(first) = self.backend.set(&full, &raw) {
            debug!(key, error = %first, "Cache write failed, purging expired entries and retrying");
            self.clear_expired();
            if let Err(second) = self.backend.set(&full, &raw) {
                warn!(key, error = %second, "Cache write failed again, keeping entry in memory only");
                // An older durable copy must not resurface later
                self.remove_backend(&full);
            }
        }
        self.shadow().insert(full, entry);
    }

    pub fn remove(&self, key: &str) {
        let full = self.full_key(key);
        self.shadow().remove(&full);
        self.remove_backend(&full);
    }

    fn remove_backend(&self, full: &str) {
        if let Err(e) = self.backend.remove(full) {
            debug!(key = full, error = %e, "Cache backend remove failed");
        }
    }

    fn backend_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&self.namespace)).collect(),
            Err(e) => {
                debug!(error = %e, "Failed to list cache backend keys");
                Vec::new()
            }
        }
    }

    /// Remove every entry under this cache's namespace, nothing else.
    pub fn clear(&self) {
        self.shadow().clear();
        for key in self.backend_keys() {
            self.remove_backend(&key);
        }
        info!(namespace = %self.namespace, "Cache cleared");
    }

    /// Evict entries whose expiry has passed. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        self.evict_where(|entry| entry.is_expired(now))
    }

    /// Evict every entry carrying `tag`, in memory and in the backend.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let removed = self.evict_where(|entry| entry.has_tag(tag));
        debug!(tag, removed, "Invalidated cache entries by tag");
        removed
    }

    /// Reads every backend entry in this namespace, so the cost grows with
    /// the cache size. Only the expiry sweep and tag invalidation call it.
    fn evict_where(&self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut removed: HashSet<String> = HashSet::new();
        self.shadow().retain(|key, entry| {
            let evict = predicate(entry);
            if evict {
                removed.insert(key.clone());
            }
            !evict
        });
        for key in self.backend_keys() {
            if let Some(entry) = self.read_backend(&key) {
                if predicate(&entry) {
                    self.remove_backend(&key);
                    removed.insert(key);
                }
            }
        }
        removed.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            requested: self.requested,
            backend: self.backend.kind(),
            memory_entries: self.shadow().len(),
            backend_entries: self.backend_keys().len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    fn persistent(dir: PathBuf, quota_bytes: Option<u64>) -> CacheSettings {
        CacheSettings {
            backend: BackendKind::Persistent,
            dir: Some(dir),
            quota_bytes,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    #[test]
    fn test_value_visible_until_ttl_elapses() {
        let clock = clock();
        let cache = CacheManager::with_backend(Box::new(MemoryBackend::new())).with_clock(clock.clone());
        cache.set("scores", &vec![1, 2, 3], Ttl::Short, &[]);

        clock.advance(Duration::seconds(59));
        assert_eq!(cache.get::<Vec<i32>>("scores"), Some(vec![1, 2, 3]));
        assert!(cache.has("scores"));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get::<Vec<i32>>("scores"), None);
        assert!(!cache.has("scores"));
    }

    #[test]
    fn test_stale_read_returns_expired_entry_until_swept() {
        let clock = clock();
        let cache = CacheManager::with_backend(Box::new(MemoryBackend::new())).with_clock(clock.clone());
        cache.set("stats", &"overview", Ttl::Short, &[]);
        clock.advance(Duration::minutes(5));

        let stale = cache.get_stale::<String>("stats").expect("stale entry");
        assert!(stale.expired);
        assert_eq!(stale.data, "overview");
        assert_eq!(stale.age_display(clock.now()), "5m ago");

        assert_eq!(cache.clear_expired(), 1);
        assert!(cache.get_stale::<String>("stats").is_none());
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let cache = CacheManager::with_backend(Box::new(MemoryBackend::new()));
        cache.set("k", &"text", Ttl::Medium, &[]);
        assert_eq!(cache.get::<Vec<u32>>("k"), None);
    }

    #[test]
    fn test_invalidate_by_tag_only_touches_tagged_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheManager::new(&persistent(dir.path().to_path_buf(), None));
        cache.set("punters", &vec!["a"], Ttl::Long, &["punters"]);
        cache.set("punter?id=1", &"a", Ttl::Long, &["punters", "admin"]);
        cache.set("bookmakers", &vec!["b"], Ttl::Long, &["bookmakers"]);

        assert_eq!(cache.invalidate_by_tag("punters"), 2);
        assert!(!cache.has("punters"));
        assert!(!cache.has("punter?id=1"));
        assert_eq!(cache.get::<Vec<String>>("bookmakers"), Some(vec!["b".to_string()]));

        // Gone from the durable tier too
        let reopened = CacheManager::new(&persistent(dir.path().to_path_buf(), None));
        assert!(!reopened.has("punters"));
        assert!(reopened.has("bookmakers"));
        assert_eq!(reopened.invalidate_by_tag("missing"), 0);
    }

    #[test]
    fn test_persistent_entries_survive_restart_and_migrate_to_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let cache = CacheManager::new(&persistent(dir.path().to_path_buf(), None));
            cache.set("fixtures?date=2024-05-01", &vec!["x"], Ttl::Medium, &["fixtures"]);
        }
        let cache = CacheManager::new(&persistent(dir.path().to_path_buf(), None));
        assert_eq!(cache.stats().memory_entries, 0);
        assert_eq!(cache.get::<Vec<String>>("fixtures?date=2024-05-01"), Some(vec!["x".to_string()]));
        assert_eq!(cache.stats().memory_entries, 1);
        assert_eq!(cache.stats().backend_entries, 1);
    }

    #[test]
    fn test_clear_only_removes_own_namespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ours = CacheManager::new(&persistent(dir.path().to_path_buf(), None));
        let theirs = CacheManager::new(&persistent(dir.path().to_path_buf(), None)).with_namespace("other:");
        ours.set("k", &1, Ttl::Long, &[]);
        theirs.set("k", &2, Ttl::Long, &[]);

        ours.clear();
        assert_eq!(ours.get::<i32>("k"), None);
        assert_eq!(theirs.get::<i32>("k"), Some(2));
        assert_eq!(theirs.stats().backend_entries, 1);
    }

    #[test]
    fn test_quota_pressure_purges_expired_then_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = clock();
        let cache = CacheManager::new(&persistent(dir.path().to_path_buf(), Some(400))).with_clock(clock.clone());
        cache.set("old", &"o".repeat(150), Ttl::Short, &[]);
        assert_eq!(cache.stats().backend_entries, 1);

        clock.advance(Duration::minutes(2));
        cache.set("new", &"n".repeat(150), Ttl::Long, &[]);

        let stats = cache.stats();
        assert_eq!(stats.backend_entries, 1, "expired entry purged, new entry durable");
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(cache.get::<String>("new"), Some("n".repeat(150)));
        assert_eq!(cache.get_stale::<String>("old").map(|c| c.data), None);
    }

    #[test]
    fn test_write_falls_back_to_memory_when_quota_cannot_fit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CacheManager::new(&persistent(dir.path().to_path_buf(), Some(400)));
        cache.set("big", &"x".repeat(1000), Ttl::Long, &[]);

        assert_eq!(cache.get::<String>("big").map(|s| s.len()), Some(1000));
        let stats = cache.stats();
        assert_eq!(stats.backend_entries, 0);
        assert_eq!(stats.memory_entries, 1);
        assert!(!stats.is_degraded());
    }

    #[test]
    fn test_unusable_backend_downgrades_to_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").expect("write blocker");

        let cache = CacheManager::new(&persistent(blocker.join("cache"), None));
        let stats = cache.stats();
        assert_eq!(stats.backend, BackendKind::Memory);
        assert!(stats.is_degraded());

        cache.set("k", &true, Ttl::Short, &[]);
        assert_eq!(cache.get::<bool>("k"), Some(true));
    }

    #[test]
    fn test_session_backend_selected_when_requested() {
        let cache = CacheManager::new(&CacheSettings {
            backend: BackendKind::Session,
            dir: None,
            quota_bytes: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        });
        assert_eq!(cache.backend_kind(), BackendKind::Session);
        cache.set("k", &"v", Ttl::Medium, &["t"]);
        cache.remove("k");
        assert!(!cache.has("k"));
    }
}
