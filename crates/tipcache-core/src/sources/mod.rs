//! Third-party fixture providers and the fallback resolver.
//!
//! Each provider implements [`FixtureSource`] and is registered once, with
//! a priority and a credential requirement, as a [`DataSourceDescriptor`].
//! [`SourceRegistry::resolve`] walks the descriptors in priority order and
//! returns the first provider's fixtures.

pub mod api_football;
pub mod football_data;
pub mod registry;
pub mod thesportsdb;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;

pub use api_football::ApiFootballSource;
pub use football_data::FootballDataSource;
pub use registry::{Resolution, SkippedSource, SourceFailure, SourceRegistry, NO_SOURCE};
pub use thesportsdb::TheSportsDbSource;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{0} requires a credential")]
    MissingCredential(String),

    #[error(transparent)]
    Request(#[from] ApiError),

    #[error("{source_name} rejected the request: {message}")]
    Rejected { source_name: String, message: String },

    #[error("unexpected payload from {source_name}: {message}")]
    Decode { source_name: String, message: String },
}

/// A provider of raw fixture records for one day.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Raw provider records; normalization happens in the resolver.
    async fn fetch_fixtures(&self, date: NaiveDate, credential: Option<&str>) -> Result<Vec<Value>, SourceError>;
}

/// A registered provider.
#[derive(Clone)]
pub struct DataSourceDescriptor {
    pub name: String,
    /// Lower is tried first
    pub priority: u32,
    pub requires_credential: bool,
    pub source: Arc<dyn FixtureSource>,
}

impl DataSourceDescriptor {
    pub fn new(name: &str, priority: u32, requires_credential: bool, source: Arc<dyn FixtureSource>) -> Self {
        Self {
            name: name.to_string(),
            priority,
            requires_credential,
            source,
        }
    }
}

impl std::fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("requires_credential", &self.requires_credential)
            .finish()
    }
}

/// Records under `field`. A null list means "no fixtures"; a missing or
/// non-list field is a decode failure so the resolver moves on.
pub(crate) fn records_at(payload: &Value, field: &str, source_name: &str) -> Result<Vec<Value>, SourceError> {
    match payload.get(field) {
        Some(Value::Array(records)) => Ok(records.clone()),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(SourceError::Decode {
            source_name: source_name.to_string(),
            message: format!("`{}` is not a list", field),
        }),
        None => Err(SourceError::Decode {
            source_name: source_name.to_string(),
            message: format!("missing `{}`", field),
        }),
    }
}

pub(crate) fn require_credential<'a>(credential: Option<&'a str>, source_name: &str) -> Result<&'a str, SourceError> {
    credential
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| SourceError::MissingCredential(source_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_at() {
        assert_eq!(records_at(&json!({"events": [1]}), "events", "s").unwrap().len(), 1);
        assert!(records_at(&json!({"events": null}), "events", "s").unwrap().is_empty());
        assert!(matches!(records_at(&json!({}), "events", "s"), Err(SourceError::Decode { .. })));
        assert!(matches!(records_at(&json!({"events": "x"}), "events", "s"), Err(SourceError::Decode { .. })));
    }

    #[test]
    fn test_require_credential() {
        assert_eq!(require_credential(Some("k"), "s").unwrap(), "k");
        assert!(matches!(require_credential(Some("  "), "s"), Err(SourceError::MissingCredential(_))));
        assert!(require_credential(None, "s").is_err());
    }
}
