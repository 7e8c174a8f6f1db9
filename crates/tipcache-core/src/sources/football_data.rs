use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use super::{records_at, require_credential, FixtureSource, SourceError};
use crate::api::{ExecutorSettings, RequestExecutor, RequestOptions};

pub const NAME: &str = "football-data";

/// football-data.org v4: `GET /matches?dateFrom=&dateTo=` with `X-Auth-Token`.
/// Responds `{"matches": [{id, utcDate, status, competition, homeTeam, awayTeam}]}`.
pub struct FootballDataSource {
    executor: RequestExecutor,
    base_url: String,
    settings: ExecutorSettings,
}

impl FootballDataSource {
    pub fn new(executor: RequestExecutor, base_url: &str, settings: ExecutorSettings) -> Self {
        Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }
}

#[async_trait]
impl FixtureSource for FootballDataSource {
    async fn fetch_fixtures(&self, date: NaiveDate, credential: Option<&str>) -> Result<Vec<Value>, SourceError> {
        let token = require_credential(credential, NAME)?;
        let day = date.format("%Y-%m-%d").to_string();
        let options = RequestOptions::get()
            .query("dateFrom", &day)
            .query("dateTo", &day)
            .header("X-Auth-Token", token);
        let payload = self
            .executor
            .run(&format!("{}/matches", self.base_url), &options, &self.settings)
            .await
            .into_result()?;
        records_at(&payload, "matches", NAME)
    }
}
