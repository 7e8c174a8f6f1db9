use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use super::StorageError;

/// Key written and read back when checking whether a backend works.
const PROBE_KEY: &str = "__tipcache_probe__";

/// File extension for entries in directory-backed stores
const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Survives restarts
    #[default]
    Persistent,
    /// Lives as long as the process
    Session,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Persistent => write!(f, "persistent"),
            BackendKind::Session => write!(f, "session"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" | "local" | "disk" => Ok(BackendKind::Persistent),
            "session" => Ok(BackendKind::Session),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

/// Raw string storage. Namespacing, expiry and tags are the manager's job.
pub trait CacheBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Write, read back and delete a throwaway key.
    fn probe(&self) -> Result<(), StorageError> {
        self.set(PROBE_KEY, "probe")?;
        let read_back = self.get(PROBE_KEY)?;
        self.remove(PROBE_KEY)?;
        match read_back.as_deref() {
            Some("probe") => Ok(()),
            _ => Err(StorageError::Unavailable(format!(
                "{} backend did not return the probe value",
                self.kind()
            ))),
        }
    }
}

// ============================================================================
// Directory store shared by the persistent and session backends
// ============================================================================

/// Bytes on disk per entry file, seeded by one directory scan.
#[derive(Debug, Default)]
struct Usage {
    sizes: HashMap<PathBuf, u64>,
    total: u64,
}

impl Usage {
    fn record(&mut self, path: PathBuf, bytes: u64) {
        let previous = self.sizes.insert(path, bytes).unwrap_or(0);
        self.total = self.total - previous + bytes;
    }

    fn forget(&mut self, path: &Path) {
        if let Some(bytes) = self.sizes.remove(path) {
            self.total -= bytes;
        }
    }
}

/// Quota checks scan the directory once and then keep a running total, so
/// files written by other processes afterwards are not counted.
#[derive(Debug)]
struct DirStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
    /// `None` until the first write under a quota
    usage: Mutex<Option<Usage>>,
}

impl DirStore {
    fn new(dir: PathBuf, quota_bytes: Option<u64>) -> Self {
        Self {
            dir,
            quota_bytes,
            usage: Mutex::new(None),
        }
    }

    fn usage(&self) -> std::sync::MutexGuard<'_, Option<Usage>> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        let Some(quota) = self.quota_bytes else {
            fs::write(path, value)?;
            return Ok(());
        };

        let mut slot = self.usage();
        let mut usage = match slot.take() {
            Some(usage) => usage,
            None => self.scan_usage()?,
        };
        let result = Self::write_within_quota(&mut usage, path, value, quota);
        *slot = Some(usage);
        result
    }

    fn write_within_quota(usage: &mut Usage, path: PathBuf, value: &str, quota: u64) -> Result<(), StorageError> {
        let used = usage.total - usage.sizes.get(&path).copied().unwrap_or(0);
        let requested = value.len() as u64;
        if used + requested > quota {
            return Err(StorageError::QuotaExceeded { used, requested, quota });
        }
        fs::write(&path, value)?;
        usage.record(path, requested);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(usage) = self.usage().as_mut() {
            usage.forget(&path);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(decode_key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn scan_usage(&self) -> Result<Usage, StorageError> {
        let mut usage = Usage::default();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let bytes = dir_entry.metadata()?.len();
            usage.record(dir_entry.path(), bytes);
        }
        Ok(usage)
    }
}

/// Map a key onto a portable file name: ASCII alphanumerics and `-` stay,
/// every other byte becomes `_XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'_' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

// ============================================================================
// Backends
// ============================================================================

/// Entries as JSON files under a cache directory.
#[derive(Debug)]
pub struct PersistentBackend {
    store: DirStore,
}

impl PersistentBackend {
    pub fn new(dir: PathBuf, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            store: DirStore::new(dir, quota_bytes),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.store.dir
    }
}

impl CacheBackend for PersistentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Persistent
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.store.keys()
    }
}

/// Entries in a private temporary directory that is deleted with the backend.
#[derive(Debug)]
pub struct SessionBackend {
    store: DirStore,
    _dir: TempDir,
}

impl SessionBackend {
    pub fn new(quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let dir = tempfile::Builder::new().prefix("tipcache-session-").tempdir()?;
        Ok(Self {
            store: DirStore::new(dir.path().to_path_buf(), quota_bytes),
            _dir: dir,
        })
    }
}

impl CacheBackend for SessionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Session
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.store.keys()
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries().keys().cloned().collect())
    }
}
