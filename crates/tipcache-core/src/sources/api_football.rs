use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use super::{records_at, require_credential, FixtureSource, SourceError};
use crate::api::{ExecutorSettings, RequestExecutor, RequestOptions};

pub const NAME: &str = "api-football";

/// API-Football v3: `GET /fixtures?date=` with the key in `x-apisports-key`.
/// Responds `{"errors": .., "response": [{fixture, league, teams}]}`.
pub struct ApiFootballSource {
    executor: RequestExecutor,
    base_url: String,
    settings: ExecutorSettings,
}

impl ApiFootballSource {
    pub fn new(executor: RequestExecutor, base_url: &str, settings: ExecutorSettings) -> Self {
        Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }
}

/// API-Football reports bad keys and quota exhaustion as a 200 with a
/// non-empty `errors` object or list.
fn rejection(payload: &Value) -> Option<String> {
    match payload.get("errors") {
        Some(Value::Object(errors)) if !errors.is_empty() => Some(Value::Object(errors.clone()).to_string()),
        Some(Value::Array(errors)) if !errors.is_empty() => Some(Value::Array(errors.clone()).to_string()),
        _ => None,
    }
}

#[async_trait]
impl FixtureSource for ApiFootballSource {
    async fn fetch_fixtures(&self, date: NaiveDate, credential: Option<&str>) -> Result<Vec<Value>, SourceError> {
        let key = require_credential(credential, NAME)?;
        let options = RequestOptions::get()
            .query("date", date.format("%Y-%m-%d"))
            .header("x-apisports-key", key);
        let payload = self
            .executor
            .run(&format!("{}/fixtures", self.base_url), &options, &self.settings)
            .await
            .into_result()?;

        if let Some(message) = rejection(&payload) {
            return Err(SourceError::Rejected {
                source_name: NAME.to_string(),
                message,
            });
        }
        records_at(&payload, "response", NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> ApiFootballSource {
        ApiFootballSource::new(
            RequestExecutor::new().expect("executor"),
            &server.uri(),
            ExecutorSettings::extended().with_max_retries(0),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_fixtures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fixtures"))
            .and(query_param("date", "2024-05-01"))
            .and(header("x-apisports-key", "k1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [],
                "response": [{"fixture": {"id": 1}, "teams": {"home": {"name": "A"}, "away": {"name": "B"}}}]
            })))
            .mount(&server)
            .await;

        let records = source(&server).fetch_fixtures(date(), Some("k1")).await.expect("fixtures");
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_object_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": {"token": "Error/Missing application key"},
                "response": []
            })))
            .mount(&server)
            .await;

        let err = source(&server).fetch_fixtures(date(), Some("bad")).await.unwrap_err();
        assert!(matches!(err, SourceError::Rejected { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(path("/fixtures"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = source(&server).fetch_fixtures(date(), None).await.unwrap_err();
        assert!(matches!(err, SourceError::MissingCredential(_)));
    }
}
