use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::fetched::{CachedPayload, FetchOptions, Fetched, Outcome, ResourceData};
use crate::api::{ApiClient, ApiError, RequestExecutor};
use crate::auth::CredentialStore;
use crate::cache::{CacheKey, CacheManager, Ttl};
use crate::config::Config;
use crate::mapping::{extract_records, group_by_category, normalize_fixture, normalize_prediction, normalize_stats};
use crate::models::{AdminResource, BettingCode, Bookmaker, Fixture, Prediction, Punter, StatsOverview};
use crate::sources::{SourceRegistry, NO_SOURCE};

/// Source label for data served by the prediction backend
const BACKEND_SOURCE: &str = "api";

/// Fixture detail lookups in flight at once
const MAX_CONCURRENT: usize = 5;

/// Health check period when the service is built without a config
const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);

const TAG_PREDICTIONS: &str = "predictions";
const TAG_FIXTURES: &str = "fixtures";
const TAG_LIVE: &str = "live";
const TAG_STATS: &str = "stats";

/// Where a resource is cached and whether reaching it depends on the backend.
struct Resource {
    key: String,
    ttl: Ttl,
    tags: Vec<&'static str>,
    /// Skipped while the backend is marked unavailable
    uses_backend: bool,
}

impl Resource {
    fn backend(key: CacheKey, ttl: Ttl, tags: Vec<&'static str>) -> Self {
        Self {
            key: key.to_string(),
            ttl,
            tags,
            uses_backend: true,
        }
    }
}

/// Data from a successful network path.
struct Sourced<T> {
    data: T,
    source: String,
    diagnostics: Vec<String>,
}

impl<T> Sourced<T> {
    fn backend(data: T) -> Self {
        Self {
            data,
            source: BACKEND_SOURCE.to_string(),
            diagnostics: Vec::new(),
        }
    }
}

struct FetchFailure {
    diagnostics: Vec<String>,
    /// The upstream looks down, not merely unhappy with the request
    outage: bool,
}

impl From<ApiError> for FetchFailure {
    fn from(e: ApiError) -> Self {
        Self {
            outage: e.indicates_outage(),
            diagnostics: vec![e.to_string()],
        }
    }
}

/// Run `check` on every tick of a `period` interval, never faster than once
/// a second. Ticks missed while a check is in flight are not made up.
fn spawn_periodic<F, Fut>(period: Duration, mut check: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let period = period.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            check().await;
        }
    })
}

/// Outcome of each resource reloaded by [`DataService::refresh_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl RefreshReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| outcome.is_failure()).count()
    }
}

/// Unified entry point for every dashboard resource.
/// Clone is cheap; clones share the cache, the connection pool and the
/// availability flag.
#[derive(Clone)]
pub struct DataService {
    cache: Arc<CacheManager>,
    api: ApiClient,
    registry: Arc<SourceRegistry>,
    /// Upstream key for credentialed fixture providers
    credential: Option<String>,
    available: Arc<AtomicBool>,
    health_interval: Duration,
}

impl DataService {
    /// Wire up cache, backend client and fixture providers from `config`.
    /// The upstream credential comes from the environment or the keychain.
    pub fn new(config: &Config) -> Result<Self> {
        let executor = RequestExecutor::new().context("Failed to create HTTP client")?;
        let mut api =
            ApiClient::new(&config.api_base_url, executor.clone()).with_settings(config.primary, config.extended);
        api.set_token(config.api_token.clone());
        let registry = SourceRegistry::standard(&config.providers, executor, config.extended);
        let cache = CacheManager::new(&config.cache);

        info!(
            api = %config.api_base_url,
            cache = %cache.backend_kind(),
            sources = registry.sources().len(),
            "Data service ready"
        );
        Ok(Self::from_parts(
            Arc::new(cache),
            api,
            Arc::new(registry),
            CredentialStore::resolve(),
        )
        .with_health_interval(Duration::from_secs(config.health_interval_secs)))
    }

    pub fn from_parts(
        cache: Arc<CacheManager>,
        api: ApiClient,
        registry: Arc<SourceRegistry>,
        credential: Option<String>,
    ) -> Self {
        Self {
            cache,
            api,
            registry,
            credential,
            available: Arc::new(AtomicBool::new(true)),
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    pub fn with_health_interval(mut self, period: Duration) -> Self {
        self.health_interval = period;
        self
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    // ===== Availability =====

    pub fn is_api_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn mark_unavailable(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!("Backend marked unavailable; serving from cache until the next healthy probe");
        }
    }

    /// Probe the backend and record the result.
    pub async fn check_health(&self) -> bool {
        let healthy = self.api.health_check().await;
        let previous = self.available.swap(healthy, Ordering::SeqCst);
        if previous != healthy {
            info!(available = healthy, "Backend availability changed");
        }
        healthy
    }

    /// Start the periodic health check at the configured interval. The
    /// first check runs immediately.
    pub fn start_health_monitor(&self) -> JoinHandle<()> {
        self.spawn_health_monitor(self.health_interval)
    }

    /// Probe the backend every `period` until the handle is aborted.
    pub fn spawn_health_monitor(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        spawn_periodic(period, move || {
            let service = service.clone();
            async move { service.check_health().await }
        })
    }

    // ===== Core read path =====

    fn now(&self) -> DateTime<Utc> {
        self.cache.clock().now()
    }

    /// Cache first, then network, then stale cache, then the typed default.
    async fn cached_or_fetch<T, F, Fut>(&self, resource: Resource, options: FetchOptions, fetch: F) -> Fetched<T>
    where
        T: ResourceData + Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Sourced<T>, FetchFailure>>,
    {
        if !options.force_refresh {
            if let Some(hit) = self.cache.get_entry::<CachedPayload<T>>(&resource.key, false) {
                debug!(key = %resource.key, "Cache hit");
                return Fetched {
                    data: hit.data.data,
                    outcome: Outcome::Cached,
                    source: hit.data.source,
                    fetched_at: hit.cached_at,
                    diagnostics: Vec::new(),
                };
            }
        }

        if resource.uses_backend && !self.is_api_available() {
            debug!(key = %resource.key, "Backend unavailable; skipping network");
            return self.fallback(&resource.key, vec!["backend unavailable".to_string()]);
        }

        match fetch().await {
            Ok(sourced) => {
                let payload = CachedPayload {
                    data: sourced.data,
                    source: sourced.source,
                };
                self.cache.set(&resource.key, &payload, resource.ttl, &resource.tags);
                let outcome = if payload.data.is_empty() {
                    Outcome::Empty
                } else {
                    Outcome::Fresh
                };
                Fetched {
                    data: payload.data,
                    outcome,
                    source: payload.source,
                    fetched_at: self.now(),
                    diagnostics: sourced.diagnostics,
                }
            }
            Err(failure) => {
                if resource.uses_backend && failure.outage {
                    self.mark_unavailable();
                }
                warn!(key = %resource.key, reasons = ?failure.diagnostics, "Fetch failed; trying cache");
                self.fallback(&resource.key, failure.diagnostics)
            }
        }
    }

    fn fallback<T>(&self, key: &str, diagnostics: Vec<String>) -> Fetched<T>
    where
        T: ResourceData + DeserializeOwned,
    {
        match self.cache.get_stale::<CachedPayload<T>>(key) {
            Some(hit) => {
                debug!(key, expired = hit.expired, "Serving earlier cache entry");
                Fetched {
                    data: hit.data.data,
                    outcome: Outcome::Stale,
                    source: hit.data.source,
                    fetched_at: hit.cached_at,
                    diagnostics,
                }
            }
            None => Fetched {
                data: T::default(),
                outcome: Outcome::Failed,
                source: NO_SOURCE.to_string(),
                fetched_at: self.now(),
                diagnostics,
            },
        }
    }

    // ===== Predictions =====

    pub async fn get_daily_predictions(&self, date: NaiveDate, options: FetchOptions) -> Fetched<Vec<Prediction>> {
        let resource = Resource::backend(
            CacheKey::new("predictions/daily").param("date", date),
            Ttl::Medium,
            vec![TAG_PREDICTIONS],
        );
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_daily_predictions(date).await.into_result()?;
            Ok::<_, FetchFailure>(Sourced::backend(predictions_from(&payload, self.now())))
        })
        .await
    }

    pub async fn get_predictions_by_category(&self, category: &str, options: FetchOptions) -> Fetched<Vec<Prediction>> {
        let category = category.trim().to_lowercase();
        let resource = Resource::backend(
            CacheKey::new("predictions").param("category", &category),
            Ttl::Medium,
            vec![TAG_PREDICTIONS],
        );
        let category = &category;
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_predictions_by_category(category).await.into_result()?;
            Ok::<_, FetchFailure>(Sourced::backend(predictions_from(&payload, self.now())))
        })
        .await
    }

    /// Best predictions keyed by lowercase category.
    pub async fn get_best_predictions_by_category(
        &self,
        options: FetchOptions,
    ) -> Fetched<BTreeMap<String, Vec<Prediction>>> {
        let resource = Resource::backend(CacheKey::new("predictions/best"), Ttl::Medium, vec![TAG_PREDICTIONS]);
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_best_predictions().await.into_result()?;
            Ok::<_, FetchFailure>(Sourced::backend(grouped_predictions(&payload, self.now())))
        })
        .await
    }

    // ===== Fixtures =====

    /// Fixtures for `date` from the first provider with data. Providers are
    /// third parties, so this ignores the backend availability flag.
    pub async fn get_fixtures(&self, date: NaiveDate, options: FetchOptions) -> Fetched<Vec<Fixture>> {
        let resource = Resource {
            key: CacheKey::new("fixtures").param("date", date).to_string(),
            ttl: Ttl::Medium,
            tags: vec![TAG_FIXTURES],
            uses_backend: false,
        };
        self.cached_or_fetch(resource, options, move || async move {
            let resolution = self.registry.resolve(date, self.credential.as_deref(), self.now()).await;
            let diagnostics: Vec<String> = resolution
                .skipped
                .iter()
                .map(|skip| skip.reason.clone())
                .chain(
                    resolution
                        .errors
                        .iter()
                        .map(|failure| format!("{}: {}", failure.source, failure.message)),
                )
                .collect();
            if !resolution.succeeded() {
                return Err(FetchFailure {
                    diagnostics,
                    outage: false,
                });
            }
            Ok(Sourced {
                data: resolution.fixtures,
                source: resolution.source,
                diagnostics,
            })
        })
        .await
    }

    pub async fn get_live_scores(&self, options: FetchOptions) -> Fetched<Vec<Fixture>> {
        let resource = Resource::backend(CacheKey::new("fixtures/live"), Ttl::Short, vec![TAG_FIXTURES, TAG_LIVE]);
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_live_scores().await.into_result()?;
            let now = self.now();
            let fixtures = extract_records(&payload)
                .iter()
                .map(|record| normalize_fixture(record, BACKEND_SOURCE, now))
                .collect();
            Ok::<_, FetchFailure>(Sourced::backend(fixtures))
        })
        .await
    }

    /// Backend detail for one fixture; `None` data when the prediction has no
    /// fixture id.
    pub async fn get_fixture_detail(&self, fixture_id: Option<&str>, options: FetchOptions) -> Fetched<Option<Fixture>> {
        let id = match fixture_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                return Fetched {
                    data: None,
                    outcome: Outcome::Empty,
                    source: NO_SOURCE.to_string(),
                    fetched_at: self.now(),
                    diagnostics: Vec::new(),
                }
            }
        };

        let resource = Resource::backend(CacheKey::new("fixtures/detail").param("id", id), Ttl::Medium, vec![TAG_FIXTURES]);
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_fixture(id).await.into_result()?;
            let record = unwrap_data(&payload);
            if !record.is_object() {
                let invalid = ApiError::InvalidResponse(format!("fixture {} is not an object", id));
                return Err(FetchFailure::from(invalid));
            }
            let fixture = normalize_fixture(record, BACKEND_SOURCE, self.now());
            Ok::<_, FetchFailure>(Sourced::backend(Some(fixture)))
        })
        .await
    }

    /// Fixture details for each prediction, in the same order as `predictions`.
    pub async fn get_prediction_fixtures(
        &self,
        predictions: &[Prediction],
        options: FetchOptions,
    ) -> Vec<Fetched<Option<Fixture>>> {
        let mut results = Vec::with_capacity(predictions.len());
        for chunk in predictions.chunks(MAX_CONCURRENT) {
            let futures: Vec<_> = chunk
                .iter()
                .map(|prediction| self.get_fixture_detail(prediction.fixture_id.as_deref(), options))
                .collect();
            results.extend(futures::future::join_all(futures).await);
        }
        debug!(count = results.len(), "Fixture details fetched");
        results
    }

    // ===== Stats =====

    pub async fn get_stats_overview(&self, options: FetchOptions) -> Fetched<StatsOverview> {
        let resource = Resource::backend(CacheKey::new("stats/overview"), Ttl::Long, vec![TAG_STATS]);
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.fetch_stats_overview().await.into_result()?;
            Ok::<_, FetchFailure>(Sourced::backend(normalize_stats(unwrap_data(&payload))))
        })
        .await
    }

    // ===== Reference lists =====

    pub async fn get_punters(&self, options: FetchOptions) -> Fetched<Vec<Punter>> {
        self.get_admin_list(AdminResource::Punters, options).await
    }

    pub async fn get_bookmakers(&self, options: FetchOptions) -> Fetched<Vec<Bookmaker>> {
        self.get_admin_list(AdminResource::Bookmakers, options).await
    }

    pub async fn get_betting_codes(&self, options: FetchOptions) -> Fetched<Vec<BettingCode>> {
        self.get_admin_list(AdminResource::BettingCodes, options).await
    }

    async fn get_admin_list<T>(&self, kind: AdminResource, options: FetchOptions) -> Fetched<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let resource = Resource::backend(CacheKey::new(kind.path()), kind.ttl(), vec![kind.tag()]);
        self.cached_or_fetch(resource, options, move || async move {
            let payload = self.api.list(kind).await.into_result()?;
            let items = extract_records(&payload)
                .into_iter()
                .filter_map(|record| match serde_json::from_value::<T>(record) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        debug!(resource = %kind, error = %e, "Skipping malformed record");
                        None
                    }
                })
                .collect();
            Ok::<_, FetchFailure>(Sourced::backend(items))
        })
        .await
    }

    // ===== Admin writes =====

    pub async fn create_punter(&self, punter: &Punter) -> std::result::Result<Value, ApiError> {
        self.create(AdminResource::Punters, punter).await
    }

    pub async fn update_punter(&self, id: &str, punter: &Punter) -> std::result::Result<Value, ApiError> {
        self.update(AdminResource::Punters, id, punter).await
    }

    pub async fn delete_punter(&self, id: &str) -> std::result::Result<(), ApiError> {
        self.delete(AdminResource::Punters, id).await
    }

    pub async fn create_bookmaker(&self, bookmaker: &Bookmaker) -> std::result::Result<Value, ApiError> {
        self.create(AdminResource::Bookmakers, bookmaker).await
    }

    pub async fn update_bookmaker(&self, id: &str, bookmaker: &Bookmaker) -> std::result::Result<Value, ApiError> {
        self.update(AdminResource::Bookmakers, id, bookmaker).await
    }

    pub async fn delete_bookmaker(&self, id: &str) -> std::result::Result<(), ApiError> {
        self.delete(AdminResource::Bookmakers, id).await
    }

    pub async fn create_betting_code(&self, code: &BettingCode) -> std::result::Result<Value, ApiError> {
        self.create(AdminResource::BettingCodes, code).await
    }

    pub async fn update_betting_code(&self, id: &str, code: &BettingCode) -> std::result::Result<Value, ApiError> {
        self.update(AdminResource::BettingCodes, id, code).await
    }

    pub async fn delete_betting_code(&self, id: &str) -> std::result::Result<(), ApiError> {
        self.delete(AdminResource::BettingCodes, id).await
    }

    async fn create<T: Serialize>(&self, kind: AdminResource, item: &T) -> std::result::Result<Value, ApiError> {
        let body = encode(item)?;
        let created = self.api.create(kind, body).await.into_result();
        self.after_write(kind, "create", created)
    }

    async fn update<T: Serialize>(&self, kind: AdminResource, id: &str, item: &T) -> std::result::Result<Value, ApiError> {
        let body = encode(item)?;
        let updated = self.api.update(kind, id, body).await.into_result();
        self.after_write(kind, "update", updated)
    }

    async fn delete(&self, kind: AdminResource, id: &str) -> std::result::Result<(), ApiError> {
        let deleted = self.api.delete(kind, id).await.into_result();
        self.after_write(kind, "delete", deleted).map(|_| ())
    }

    /// Drop every cached entry derived from `kind` once a write went through.
    fn after_write(
        &self,
        kind: AdminResource,
        action: &str,
        result: std::result::Result<Value, ApiError>,
    ) -> std::result::Result<Value, ApiError> {
        match result {
            Ok(value) => {
                let removed = self.cache.invalidate_by_tag(kind.tag());
                info!(resource = %kind, action, removed, "Admin write applied");
                Ok(value)
            }
            Err(e) => {
                if e.indicates_outage() {
                    self.mark_unavailable();
                }
                warn!(resource = %kind, action, error = %e, "Admin write failed");
                Err(e)
            }
        }
    }

    // ===== Bulk =====

    /// Reload the dashboard's main resources, bypassing cache reads.
    pub async fn refresh_all(&self, date: NaiveDate) -> RefreshReport {
        let options = FetchOptions::refresh();
        let (daily, best, fixtures, live, stats) = tokio::join!(
            self.get_daily_predictions(date, options),
            self.get_best_predictions_by_category(options),
            self.get_fixtures(date, options),
            self.get_live_scores(options),
            self.get_stats_overview(options),
        );

        let report = RefreshReport {
            outcomes: vec![
                ("daily-predictions".to_string(), daily.outcome),
                ("best-predictions".to_string(), best.outcome),
                ("fixtures".to_string(), fixtures.outcome),
                ("live-scores".to_string(), live.outcome),
                ("stats-overview".to_string(), stats.outcome),
            ],
        };
        info!(failures = report.failures(), "Refresh complete");
        report
    }
}

fn encode<T: Serialize>(item: &T) -> std::result::Result<Value, ApiError> {
    serde_json::to_value(item).map_err(|e| ApiError::Encode(e.to_string()))
}

/// `{"data": {...}}` envelopes around single objects.
fn unwrap_data(payload: &Value) -> &Value {
    payload.get("data").filter(|data| data.is_object()).unwrap_or(payload)
}

fn predictions_from(payload: &Value, now: DateTime<Utc>) -> Vec<Prediction> {
    extract_records(payload)
        .iter()
        .map(|record| normalize_prediction(record, now))
        .collect()
}

/// Accepts either a flat list (grouped by each record's category) or an
/// object keyed by category.
fn grouped_predictions(payload: &Value, now: DateTime<Utc>) -> BTreeMap<String, Vec<Prediction>> {
    let flat = predictions_from(payload, now);
    if !flat.is_empty() {
        return group_by_category(flat);
    }

    let mut grouped = BTreeMap::new();
    if let Value::Object(map) = unwrap_data(payload) {
        for (category, records) in map {
            let Value::Array(records) = records else {
                continue;
            };
            let category = category.to_lowercase();
            let predictions = records
                .iter()
                .map(|record| Prediction {
                    category: category.clone(),
                    ..normalize_prediction(record, now)
                })
                .collect();
            grouped.insert(category, predictions);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExecutorSettings;
    use crate::cache::{ManualClock, MemoryBackend};
    use crate::config::ProviderSettings;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        service: DataService,
        executor: RequestExecutor,
    }

    fn providers(base: &str) -> ProviderSettings {
        ProviderSettings {
            api_football_url: format!("{}/af", base),
            football_data_url: format!("{}/fd", base),
            thesportsdb_url: format!("{}/tsdb", base),
            thesportsdb_key: "3".to_string(),
        }
    }

    fn harness_with(base: &str, cache: CacheManager) -> Harness {
        let executor = RequestExecutor::new().expect("executor");
        let fast = ExecutorSettings::primary()
            .with_max_retries(0)
            .with_timeout(Duration::from_secs(2));
        let api = ApiClient::new(base, executor.clone()).with_settings(fast, fast);
        let registry = SourceRegistry::standard(&providers(base), executor.clone(), fast);
        Harness {
            service: DataService::from_parts(Arc::new(cache), api, Arc::new(registry), None),
            executor,
        }
    }

    fn harness(base: &str) -> Harness {
        harness_with(base, CacheManager::with_backend(Box::new(MemoryBackend::new())))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn prediction_json(home: &str) -> Value {
        json!({"id": 1, "home_team": home, "away_team": "Away", "category": "BTTS", "odds": "1.85"})
    }

    #[tokio::test]
    async fn test_warm_cache_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/daily"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [prediction_json("Home")]})))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        let first = h.service.get_daily_predictions(date(), FetchOptions::default()).await;
        assert_eq!(first.outcome, Outcome::Fresh);
        assert_eq!(first.source, "api");
        assert_eq!(first.data[0].home_team, "Home");
        assert_eq!(first.data[0].odds, 1.85);

        let second = h.service.get_daily_predictions(date(), FetchOptions::default()).await;
        assert_eq!(second.outcome, Outcome::Cached);
        assert_eq!(second.data, first.data);
        assert_eq!(h.executor.attempts(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades_to_default() {
        let h = harness("http://127.0.0.1:1");

        let stats = h.service.get_stats_overview(FetchOptions::default()).await;

        assert_eq!(stats.outcome, Outcome::Failed);
        assert_eq!(stats.data, StatsOverview::default());
        assert_eq!(stats.source, NO_SOURCE);
        assert_eq!(stats.diagnostics.len(), 1);
        assert!(!h.service.is_api_available());

        let punters = h.service.get_punters(FetchOptions::default()).await;
        assert_eq!(punters.outcome, Outcome::Failed);
        assert!(punters.data.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_served_when_network_fails() {
        let server = MockServer::start().await;
        Mock::given(path("/stats/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"total": 10, "won": 6, "lost": 4}})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/stats/overview"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = CacheManager::with_backend(Box::new(MemoryBackend::new())).with_clock(clock.clone());
        let h = harness_with(&server.uri(), cache);

        let fresh = h.service.get_stats_overview(FetchOptions::default()).await;
        assert_eq!(fresh.outcome, Outcome::Fresh);
        assert_eq!(fresh.data.total_predictions, 10);

        clock.advance(chrono::Duration::seconds(Ttl::Long.as_secs() as i64 + 1));
        let stale = h.service.get_stats_overview(FetchOptions::default()).await;

        assert_eq!(stale.outcome, Outcome::Stale);
        assert_eq!(stale.data.won, 6);
        assert_eq!(stale.source, "api");
        assert!(!h.service.is_api_available());
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_read_but_writes_back() {
        let server = MockServer::start().await;
        Mock::given(path("/predictions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([prediction_json("First")])))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/predictions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([prediction_json("Second")])))
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        let first = h.service.get_predictions_by_category("BTTS", FetchOptions::default()).await;
        assert_eq!(first.data[0].home_team, "First");

        let refreshed = h.service.get_predictions_by_category("btts", FetchOptions::refresh()).await;
        assert_eq!(refreshed.outcome, Outcome::Fresh);
        assert_eq!(refreshed.data[0].home_team, "Second");

        let cached = h.service.get_predictions_by_category("btts", FetchOptions::default()).await;
        assert_eq!(cached.outcome, Outcome::Cached);
        assert_eq!(cached.data[0].home_team, "Second");
        assert_eq!(h.executor.attempts(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_backend_skips_network_but_not_providers() {
        let server = MockServer::start().await;
        Mock::given(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/predictions/daily"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(path("/tsdb/3/eventsday.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "events": [{"idEvent": "77", "strHomeTeam": "Leeds", "strAwayTeam": "Hull", "strLeague": "Championship", "dateEvent": "2024-05-01"}]
            })))
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        assert!(!h.service.check_health().await);
        assert!(!h.service.is_api_available());

        let daily = h.service.get_daily_predictions(date(), FetchOptions::default()).await;
        assert_eq!(daily.outcome, Outcome::Failed);
        assert_eq!(daily.diagnostics, vec!["backend unavailable".to_string()]);

        let fixtures = h.service.get_fixtures(date(), FetchOptions::default()).await;
        assert_eq!(fixtures.outcome, Outcome::Fresh);
        assert_eq!(fixtures.source, "thesportsdb");
        assert_eq!(fixtures.data[0].matchup(), "Leeds vs Hull");
        // Both credentialed providers were skipped
        assert_eq!(fixtures.diagnostics.len(), 2);
    }

    #[tokio::test]
    async fn test_undated_fixture_uses_cache_clock() {
        let server = MockServer::start().await;
        Mock::given(path("/tsdb/3/eventsday.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "events": [{"idEvent": "78", "strHomeTeam": "Derby", "strAwayTeam": "Stoke"}]
            })))
            .mount(&server)
            .await;
        let kickoff = Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap();
        let cache = CacheManager::with_backend(Box::new(MemoryBackend::new()))
            .with_clock(Arc::new(ManualClock::new(kickoff)));
        let h = harness_with(&server.uri(), cache);

        let fixtures = h.service.get_fixtures(date(), FetchOptions::default()).await;

        assert_eq!(fixtures.outcome, Outcome::Fresh);
        assert_eq!(fixtures.data[0].match_date, kickoff);
    }

    #[tokio::test]
    async fn test_health_recovery_restores_availability() {
        let server = MockServer::start().await;
        Mock::given(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let h = harness("http://127.0.0.1:1");
        let _ = h.service.get_live_scores(FetchOptions::default()).await;
        assert!(!h.service.is_api_available());

        let recovered = harness(&server.uri());
        recovered.service.available.store(false, Ordering::SeqCst);
        assert!(recovered.service.check_health().await);
        assert!(recovered.service.is_api_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_check_runs_once_per_period() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = spawn_periodic(Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        // Ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_check_never_spins() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = spawn_periodic(Duration::ZERO, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_health_monitor_restores_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stats/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"wins": 3, "losses": 1})))
            .mount(&server)
            .await;
        let h = harness(&server.uri());
        let service = h.service.with_health_interval(Duration::from_secs(3600));
        service.available.store(false, Ordering::SeqCst);

        let skipped = service.get_stats_overview(FetchOptions::default()).await;
        assert_eq!(skipped.outcome, Outcome::Failed);

        let monitor = service.start_health_monitor();
        for _ in 0..100 {
            if service.is_api_available() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        monitor.abort();
        assert!(service.is_api_available());

        let stats = service.get_stats_overview(FetchOptions::default()).await;
        assert_eq!(stats.outcome, Outcome::Fresh);
        assert_eq!(stats.data.won, 3);
    }

    #[tokio::test]
    async fn test_admin_write_invalidates_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/punters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1, "name": "Ada"}]})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/punters"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2, "name": "Grace"})))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        let punters = h.service.get_punters(FetchOptions::default()).await;
        assert_eq!(punters.data[0].id, "1");
        assert_eq!(h.service.get_punters(FetchOptions::default()).await.outcome, Outcome::Cached);

        let created = h
            .service
            .create_punter(&Punter {
                name: "Grace".to_string(),
                ..Default::default()
            })
            .await
            .expect("created");
        assert_eq!(created["id"], 2);

        let reloaded = h.service.get_punters(FetchOptions::default()).await;
        assert_eq!(reloaded.outcome, Outcome::Fresh);
    }

    #[tokio::test]
    async fn test_failed_admin_write_keeps_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookmakers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "b1", "name": "Acme"}])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/bookmakers/b1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        h.service.get_bookmakers(FetchOptions::default()).await;
        let err = h.service.delete_bookmaker("b1").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.service.get_bookmakers(FetchOptions::default()).await.outcome, Outcome::Cached);
        assert!(h.service.is_api_available());
    }

    #[tokio::test]
    async fn test_fixture_fan_out_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures/10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"id": 10, "homeTeam": "Slow", "awayTeam": "B"}}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(path("/fixtures/20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 20, "homeTeam": "Quick", "awayTeam": "D"})))
            .mount(&server)
            .await;
        let h = harness(&server.uri());
        let now = Utc::now();
        let with_id = |id: Option<&str>| Prediction {
            fixture_id: id.map(str::to_string),
            ..normalize_prediction(&json!({}), now)
        };
        let predictions = vec![with_id(Some("10")), with_id(None), with_id(Some("20"))];

        let details = h
            .service
            .get_prediction_fixtures(&predictions, FetchOptions::default())
            .await;

        assert_eq!(details.len(), 3);
        assert_eq!(details[0].data.as_ref().map(|f| f.home_team.as_str()), Some("Slow"));
        assert_eq!(details[1].outcome, Outcome::Empty);
        assert!(details[1].data.is_none());
        assert_eq!(details[2].data.as_ref().map(|f| f.id.as_str()), Some("20"));
    }

    #[tokio::test]
    async fn test_best_predictions_keyed_by_category() {
        let server = MockServer::start().await;
        Mock::given(path("/predictions/best"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"Over 2.5": [prediction_json("A")], "BTTS": [prediction_json("B"), prediction_json("C")]}
            })))
            .mount(&server)
            .await;
        let h = harness(&server.uri());

        let best = h.service.get_best_predictions_by_category(FetchOptions::default()).await;

        assert_eq!(best.outcome, Outcome::Fresh);
        assert_eq!(best.data["btts"].len(), 2);
        assert_eq!(best.data["over 2.5"][0].category, "over 2.5");
    }

    #[test]
    fn test_grouped_predictions_from_flat_list() {
        let payload = json!([
            {"home_team": "A", "category": "Win"},
            {"home_team": "B", "category": "win"},
            {"home_team": "C"}
        ]);
        let grouped = grouped_predictions(&payload, Utc::now());
        assert_eq!(grouped["win"].len(), 2);
        assert_eq!(grouped["general"].len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_all_reports_every_resource() {
        let h = harness("http://127.0.0.1:1");

        let report = h.service.refresh_all(date()).await;

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.failures(), 5);
        assert!(report.outcomes.iter().any(|(name, _)| name == "fixtures"));
    }
}
