use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage quota exceeded: {used} + {requested} bytes exceeds {quota}")]
    QuotaExceeded { used: u64, requested: u64, quota: u64 },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
