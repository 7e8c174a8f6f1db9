use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    api_football, football_data, thesportsdb, ApiFootballSource, DataSourceDescriptor, FootballDataSource,
    SourceError, TheSportsDbSource,
};
use crate::api::{ExecutorSettings, RequestExecutor};
use crate::config::ProviderSettings;
use crate::mapping::normalize_fixture;
use crate::models::Fixture;
use crate::utils::truncate_string;

/// Source name reported when every provider failed.
pub const NO_SOURCE: &str = "None";

/// Longest failure message kept in a resolution's diagnostics
const MAX_FAILURE_MESSAGE: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

/// What [`SourceRegistry::resolve`] found, plus how it got there.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub fixtures: Vec<Fixture>,
    /// Provider that served `fixtures`, or [`NO_SOURCE`]
    pub source: String,
    pub errors: Vec<SourceFailure>,
    /// Providers that were actually invoked, in order
    pub attempted: Vec<String>,
    pub skipped: Vec<SkippedSource>,
}

impl Resolution {
    /// True when some provider answered, even with zero fixtures.
    pub fn succeeded(&self) -> bool {
        self.source != NO_SOURCE
    }
}

/// Ordered list of fixture providers. Built once, never mutated afterwards.
pub struct SourceRegistry {
    sources: Vec<DataSourceDescriptor>,
}

impl SourceRegistry {
    /// Providers are sorted by priority; equal priorities keep registration order.
    pub fn new(mut sources: Vec<DataSourceDescriptor>) -> Self {
        sources.sort_by_key(|s| s.priority);
        Self { sources }
    }

    /// api-football, then football-data, then TheSportsDB.
    pub fn standard(providers: &ProviderSettings, executor: RequestExecutor, settings: ExecutorSettings) -> Self {
        Self::new(vec![
            DataSourceDescriptor::new(
                api_football::NAME,
                1,
                true,
                Arc::new(ApiFootballSource::new(executor.clone(), &providers.api_football_url, settings)),
            ),
            DataSourceDescriptor::new(
                football_data::NAME,
                2,
                true,
                Arc::new(FootballDataSource::new(executor.clone(), &providers.football_data_url, settings)),
            ),
            DataSourceDescriptor::new(
                thesportsdb::NAME,
                3,
                false,
                Arc::new(TheSportsDbSource::new(
                    executor,
                    &providers.thesportsdb_url,
                    &providers.thesportsdb_key,
                    settings,
                )),
            ),
        ])
    }

    pub fn sources(&self) -> &[DataSourceDescriptor] {
        &self.sources
    }

    /// Walk the providers in priority order and return the first one with
    /// fixtures. A provider that answers with an empty list does not end the
    /// walk; if nobody has data, the first empty answer is returned. Never
    /// fails: when every provider fails the result is empty with
    /// `source == "None"` and the collected errors. Records without a kickoff
    /// time are stamped with `now`.
    pub async fn resolve(&self, date: NaiveDate, credential: Option<&str>, now: DateTime<Utc>) -> Resolution {
        let credential = credential.map(str::trim).filter(|c| !c.is_empty());
        let mut errors = Vec::new();
        let mut attempted = Vec::new();
        let mut skipped = Vec::new();
        let mut first_empty: Option<String> = None;

        for descriptor in &self.sources {
            if descriptor.requires_credential && credential.is_none() {
                debug!(source = %descriptor.name, "Skipping source without credential");
                skipped.push(SkippedSource {
                    source: descriptor.name.clone(),
                    reason: SourceError::MissingCredential(descriptor.name.clone()).to_string(),
                });
                continue;
            }

            attempted.push(descriptor.name.clone());
            match descriptor.source.fetch_fixtures(date, credential).await {
                Ok(records) if records.is_empty() => {
                    debug!(source = %descriptor.name, %date, "Source answered with no fixtures");
                    first_empty.get_or_insert_with(|| descriptor.name.clone());
                }
                Ok(records) => {
                    let fixtures = records
                        .iter()
                        .map(|record| normalize_fixture(record, &descriptor.name, now))
                        .collect::<Vec<_>>();
                    info!(source = %descriptor.name, %date, count = fixtures.len(), "Resolved fixtures");
                    return Resolution {
                        fixtures,
                        source: descriptor.name.clone(),
                        errors,
                        attempted,
                        skipped,
                    };
                }
                Err(e) => {
                    warn!(source = %descriptor.name, %date, error = %e, "Fixture source failed");
                    errors.push(SourceFailure {
                        source: descriptor.name.clone(),
                        message: truncate_string(&e.to_string(), MAX_FAILURE_MESSAGE),
                    });
                }
            }
        }

        let source = first_empty.unwrap_or_else(|| NO_SOURCE.to_string());
        if source == NO_SOURCE {
            warn!(%date, failures = errors.len(), "All fixture sources exhausted");
        }
        Resolution {
            fixtures: Vec::new(),
            source,
            errors,
            attempted,
            skipped,
        }
    }
}
