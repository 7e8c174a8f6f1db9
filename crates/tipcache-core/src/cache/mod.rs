//! Expiring, tag-invalidated key/value cache.
//!
//! This module provides the `CacheManager`, a two-tier cache: an in-memory
//! shadow in front of one of three interchangeable backends:
//!
//! - `PersistentBackend`: JSON files in a cache directory, survives restarts
//! - `SessionBackend`: same format in a temporary directory removed on drop
//! - `MemoryBackend`: process memory only
//!
//! An entry is visible while `now < expires_at`. Backend selection probes the
//! requested backend and silently downgrades to memory when it is unusable.
//! Concurrent `set` calls for one key are last-write-wins; the cache is not
//! suitable for counters or accumulators.

pub mod backend;
pub mod clock;
pub mod entry;
pub mod error;
pub mod key;
pub mod manager;

pub use backend::{BackendKind, CacheBackend, MemoryBackend, PersistentBackend, SessionBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CachedData, Ttl};
pub use error::StorageError;
pub use key::CacheKey;
pub use manager::{CacheManager, CacheStats};
