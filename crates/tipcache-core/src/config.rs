//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tipcache/config.json`; every field
//! has a default, and a handful of `TIPCACHE_*` environment variables
//! override the file (the binary loads `.env` first).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::ExecutorSettings;
use crate::cache::manager::DEFAULT_NAMESPACE;
use crate::cache::BackendKind;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tipcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend API used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Seconds between availability probes of the backend
const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 60;

pub const ENV_API_URL: &str = "TIPCACHE_API_URL";
pub const ENV_API_TOKEN: &str = "TIPCACHE_API_TOKEN";
pub const ENV_CACHE_BACKEND: &str = "TIPCACHE_CACHE_BACKEND";
pub const ENV_CACHE_DIR: &str = "TIPCACHE_CACHE_DIR";
pub const ENV_CACHE_QUOTA: &str = "TIPCACHE_CACHE_QUOTA_BYTES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: BackendKind,
    /// Directory of the persistent backend
    pub dir: Option<PathBuf>,
    /// Byte quota for durable backends; unlimited when unset
    pub quota_bytes: Option<u64>,
    pub namespace: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Persistent,
            dir: dirs::cache_dir().map(|dir| dir.join(APP_NAME)),
            quota_bytes: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Base URLs of the third-party fixture providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_football_url: String,
    pub football_data_url: String,
    pub thesportsdb_url: String,
    /// TheSportsDB's public key; the free tier uses "3"
    pub thesportsdb_key: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_football_url: "https://v3.football.api-sports.io".to_string(),
            football_data_url: "https://api.football-data.org/v4".to_string(),
            thesportsdb_url: "https://www.thesportsdb.com/api/v1/json".to_string(),
            thesportsdb_key: "3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Bearer token for the backend, if it requires one
    pub api_token: Option<String>,
    pub cache: CacheSettings,
    /// Executor settings for the prediction backend
    pub primary: ExecutorSettings,
    /// Executor settings for fixture providers and live scores
    pub extended: ExecutorSettings,
    pub providers: ProviderSettings,
    pub health_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            cache: CacheSettings::default(),
            primary: ExecutorSettings::primary(),
            extended: ExecutorSettings::extended(),
            providers: ProviderSettings::default(),
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `TIPCACHE_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token.trim().to_string());
        }
        if let Some(backend) = lookup(ENV_CACHE_BACKEND) {
            match backend.parse() {
                Ok(kind) => self.cache.backend = kind,
                Err(e) => warn!(value = %backend, error = %e, "Ignoring invalid cache backend override"),
            }
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        if let Some(quota) = lookup(ENV_CACHE_QUOTA) {
            match quota.trim().parse::<u64>() {
                Ok(bytes) => self.cache.quota_bytes = Some(bytes),
                Err(e) => warn!(value = %quota, error = %e, "Ignoring invalid cache quota override"),
            }
        }
    }
}
