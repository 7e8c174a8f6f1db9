use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiError, RequestOutcome};

/// Retry/timeout policy for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Hard limit per attempt
    pub timeout_ms: u64,
    /// Extra attempts after the first, for retryable outcomes only
    pub max_retries: u32,
    /// Linear backoff step between attempts (plus jitter); 0 retries immediately
    pub backoff_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::primary()
    }
}

impl ExecutorSettings {
    /// Prediction backend: 15s, 3 retries
    pub const fn primary() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 3,
            backoff_ms: 0,
        }
    }

    /// Extended-sports endpoints and fixture providers: 10s, 2 retries
    pub const fn extended() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            backoff_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis() as u64;
        self
    }
}

/// Method, query, headers and body of one request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::with_method(Method::GET, None)
    }

    pub fn post(body: Value) -> Self {
        Self::with_method(Method::POST, Some(body))
    }

    pub fn put(body: Value) -> Self {
        Self::with_method(Method::PUT, Some(body))
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE, None)
    }

    fn with_method(method: Method, body: Option<Value>) -> Self {
        Self {
            method,
            query: Vec::new(),
            headers: Vec::new(),
            bearer: None,
            body,
        }
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Only idempotent requests may be repeated
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
        )
    }
}

/// Executes requests with bounded retries and a hard per-attempt timeout.
/// Clone is cheap - reqwest::Client and the attempt counter are shared.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    attempts: Arc<AtomicU64>,
}

impl RequestExecutor {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Network attempts issued so far, across all clones
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Execute with a call site's settings.
    pub async fn run(&self, url: &str, options: &RequestOptions, settings: &ExecutorSettings) -> RequestOutcome<Value> {
        self.execute_inner(url, options, settings.max_retries, settings.timeout(), settings.backoff())
            .await
    }

    /// Execute `url`, retrying server errors and timeouts up to
    /// `retries_remaining` more times with no delay.
    pub async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
        retries_remaining: u32,
        timeout: Duration,
    ) -> RequestOutcome<Value> {
        self.execute_inner(url, options, retries_remaining, timeout, Duration::ZERO)
            .await
    }

    async fn execute_inner(
        &self,
        url: &str,
        options: &RequestOptions,
        retries_remaining: u32,
        timeout: Duration,
        backoff: Duration,
    ) -> RequestOutcome<Value> {
        let mut remaining = if options.is_idempotent() { retries_remaining } else { 0 };
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = self.attempt(url, options, timeout).await;
            debug!(
                endpoint = url,
                method = %options.method,
                attempt,
                retries_remaining = remaining,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = outcome.label(),
                "Request attempt finished"
            );

            if !outcome.is_retryable() || remaining == 0 {
                return outcome;
            }
            remaining -= 1;

            let delay = backoff_delay(backoff, attempt);
            warn!(
                endpoint = url,
                attempt,
                retries_remaining = remaining,
                delay_ms = delay.as_millis() as u64,
                outcome = outcome.label(),
                "Retrying request"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn attempt(&self, url: &str, options: &RequestOptions, timeout: Duration) -> RequestOutcome<Value> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let request = self.build_request(url, options);
        // Dropping the send future on timeout aborts the underlying connection
        match tokio::time::timeout(timeout, Self::send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => RequestOutcome::Timeout,
        }
    }

    fn build_request(&self, url: &str, options: &RequestOptions) -> RequestBuilder {
        let mut request = self.client.request(options.method.clone(), url);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(ref token) = options.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(ref body) = options.body {
            request = request.json(body);
        }
        request
    }

    async fn send(request: RequestBuilder) -> RequestOutcome<Value> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return RequestOutcome::Timeout,
            Err(e) => return RequestOutcome::NetworkFailure(e.to_string()),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return RequestOutcome::NetworkFailure(format!("failed to read response body: {}", e)),
        };

        if status.is_success() {
            if body.trim().is_empty() {
                return RequestOutcome::Success(Value::Null);
            }
            return match serde_json::from_str(&body) {
                Ok(value) => RequestOutcome::Success(value),
                Err(e) => RequestOutcome::NetworkFailure(format!("invalid JSON response: {}", e)),
            };
        }

        let message = ApiError::truncate_body(&body);
        if status.is_server_error() {
            RequestOutcome::ServerError {
                status: status.as_u16(),
                message,
            }
        } else {
            RequestOutcome::ClientError {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Linear step per attempt plus up to half a step of jitter.
fn backoff_delay(step: Duration, attempt: u32) -> Duration {
    let step_ms = step.as_millis() as u64;
    if step_ms == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::thread_rng().gen_range(0..=step_ms / 2);
    Duration::from_millis(step_ms.saturating_mul(attempt as u64) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor() -> RequestExecutor {
        RequestExecutor::new().expect("executor")
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_success_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/daily"))
            .and(query_param("date", "2024-05-01"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2]})))
            .expect(1)
            .mount(&server)
            .await;

        let options = RequestOptions::get()
            .query("date", "2024-05-01")
            .bearer(Some("secret".to_string()));
        let url = format!("{}/predictions/daily", server.uri());
        let outcome = executor().execute(&url, &options, 3, Duration::from_secs(5)).await;
        assert_eq!(outcome, RequestOutcome::Success(json!({"data": [1, 2]})));
    }

    #[tokio::test]
    async fn test_server_error_retried_exactly_max_retries_plus_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let executor = executor();
        let outcome = executor
            .execute(&format!("{}/stats", server.uri()), &RequestOptions::get(), 3, Duration::from_secs(5))
            .await;
        assert_eq!(
            outcome,
            RequestOutcome::ServerError {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(executor.attempts(), 4);
        assert_eq!(request_count(&server).await, 4);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let executor = executor();
        let outcome = executor
            .execute(&format!("{}/nope", server.uri()), &RequestOptions::get(), 3, Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, RequestOutcome::ClientError { status: 404, .. }));
        assert_eq!(executor.attempts(), 1);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_timeout_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;

        let executor = executor();
        let started = Instant::now();
        let outcome = executor
            .execute(&format!("{}/slow", server.uri()), &RequestOptions::get(), 2, Duration::from_millis(50))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, RequestOutcome::Timeout);
        assert_eq!(executor.attempts(), 3);
        assert!(elapsed >= Duration::from_millis(150), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let executor = executor();
        let settings = ExecutorSettings::extended().with_backoff(Duration::from_millis(10));
        let outcome = executor
            .run(&format!("{}/fixtures/live", server.uri()), &RequestOptions::get(), &settings)
            .await;
        assert_eq!(outcome, RequestOutcome::Success(json!([])));
        assert_eq!(executor.attempts(), 2);
    }

    #[tokio::test]
    async fn test_post_is_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let executor = executor();
        let outcome = executor
            .execute(
                &format!("{}/punters", server.uri()),
                &RequestOptions::post(json!({"name": "x"})),
                3,
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(outcome, RequestOutcome::ServerError { status: 503, .. }));
        assert_eq!(executor.attempts(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure_without_retry() {
        let executor = executor();
        let outcome = executor
            .execute("http://127.0.0.1:1/health", &RequestOptions::get(), 3, Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, RequestOutcome::NetworkFailure(_)), "got {:?}", outcome);
        assert_eq!(executor.attempts(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_invalid_bodies() {
        let server = MockServer::start().await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let executor = executor();
        let empty = executor
            .execute(&format!("{}/empty", server.uri()), &RequestOptions::delete(), 0, Duration::from_secs(5))
            .await;
        assert_eq!(empty, RequestOutcome::Success(Value::Null));

        let html = executor
            .execute(&format!("{}/html", server.uri()), &RequestOptions::get(), 0, Duration::from_secs(5))
            .await;
        assert!(matches!(html, RequestOutcome::NetworkFailure(_)));
    }

    #[test]
    fn test_backoff_delay_bounds() {
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
        let delay = backoff_delay(Duration::from_millis(100), 2);
        assert!(delay >= Duration::from_millis(200) && delay <= Duration::from_millis(250));
    }

    #[test]
    fn test_idempotent_methods() {
        assert!(RequestOptions::get().is_idempotent());
        assert!(RequestOptions::put(json!({})).is_idempotent());
        assert!(RequestOptions::delete().is_idempotent());
        assert!(!RequestOptions::post(json!({})).is_idempotent());
    }
}
