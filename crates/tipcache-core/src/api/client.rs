//! Client for the prediction backend's REST API.
//!
//! Endpoints return raw JSON (`serde_json::Value`); shaping it into records
//! is left to `crate::mapping` so a surprising payload degrades instead of
//! failing to deserialize.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use super::{ExecutorSettings, RequestExecutor, RequestOptions, RequestOutcome};
use crate::models::AdminResource;

/// Health probes fail fast and are never retried
const HEALTH_TIMEOUT_MS: u64 = 5_000;

/// API client for the prediction backend.
/// Clone is cheap - the executor shares its connection pool.
#[derive(Clone)]
pub struct ApiClient {
    executor: RequestExecutor,
    base_url: String,
    token: Option<String>,
    primary: ExecutorSettings,
    extended: ExecutorSettings,
}

impl ApiClient {
    pub fn new(base_url: &str, executor: RequestExecutor) -> Self {
        Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            primary: ExecutorSettings::primary(),
            extended: ExecutorSettings::extended(),
        }
    }

    /// Override retry/timeout policies (primary backend, extended endpoints)
    pub fn with_settings(mut self, primary: ExecutorSettings, extended: ExecutorSettings) -> Self {
        self.primary = primary;
        self.extended = extended;
        self
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// A client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            token: Some(token),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn options(&self, options: RequestOptions) -> RequestOptions {
        options.bearer(self.token.clone())
    }

    async fn get(&self, path: &str, options: RequestOptions) -> RequestOutcome<Value> {
        self.executor
            .run(&self.url(path), &self.options(options), &self.primary)
            .await
    }

    // ===== Predictions =====

    pub async fn fetch_daily_predictions(&self, date: NaiveDate) -> RequestOutcome<Value> {
        self.get("predictions/daily", RequestOptions::get().query("date", date.format("%Y-%m-%d")))
            .await
    }

    pub async fn fetch_predictions_by_category(&self, category: &str) -> RequestOutcome<Value> {
        self.get("predictions", RequestOptions::get().query("category", category))
            .await
    }

    /// Top predictions, either a `{category: [..]}` map or a flat list
    pub async fn fetch_best_predictions(&self) -> RequestOutcome<Value> {
        self.get("predictions/best", RequestOptions::get()).await
    }

    pub async fn fetch_stats_overview(&self) -> RequestOutcome<Value> {
        self.get("stats/overview", RequestOptions::get()).await
    }

    // ===== Fixtures =====

    pub async fn fetch_fixture(&self, fixture_id: &str) -> RequestOutcome<Value> {
        self.get(&format!("fixtures/{}", fixture_id), RequestOptions::get())
            .await
    }

    /// Live scores sit on the extended-sports endpoints
    pub async fn fetch_live_scores(&self) -> RequestOutcome<Value> {
        self.executor
            .run(&self.url("fixtures/live"), &self.options(RequestOptions::get()), &self.extended)
            .await
    }

    // ===== Admin reference data =====

    pub async fn list(&self, resource: AdminResource) -> RequestOutcome<Value> {
        self.get(resource.path(), RequestOptions::get()).await
    }

    pub async fn create(&self, resource: AdminResource, body: Value) -> RequestOutcome<Value> {
        self.executor
            .run(&self.url(resource.path()), &self.options(RequestOptions::post(body)), &self.primary)
            .await
    }

    pub async fn update(&self, resource: AdminResource, id: &str, body: Value) -> RequestOutcome<Value> {
        let url = self.url(&format!("{}/{}", resource.path(), id));
        self.executor
            .run(&url, &self.options(RequestOptions::put(body)), &self.primary)
            .await
    }

    pub async fn delete(&self, resource: AdminResource, id: &str) -> RequestOutcome<Value> {
        let url = self.url(&format!("{}/{}", resource.path(), id));
        self.executor
            .run(&url, &self.options(RequestOptions::delete()), &self.primary)
            .await
    }

    // ===== Health =====

    /// True when the backend answers its health endpoint with a 2xx.
    pub async fn health_check(&self) -> bool {
        let settings = ExecutorSettings {
            timeout_ms: HEALTH_TIMEOUT_MS.min(self.primary.timeout_ms),
            max_retries: 0,
            backoff_ms: 0,
        };
        let outcome = self
            .executor
            .run(&self.url("health"), &self.options(RequestOptions::get()), &settings)
            .await;
        debug!(outcome = outcome.label(), "Backend health probe");
        outcome.is_success()
    }
}
