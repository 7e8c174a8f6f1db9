use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use super::{records_at, FixtureSource, SourceError};
use crate::api::{ExecutorSettings, RequestExecutor, RequestOptions};

pub const NAME: &str = "thesportsdb";

/// TheSportsDB: `GET /{key}/eventsday.php?d=&s=Soccer`, no credential needed
/// beyond the public key in the path. `events` is null on days without games.
pub struct TheSportsDbSource {
    executor: RequestExecutor,
    base_url: String,
    public_key: String,
    settings: ExecutorSettings,
}

impl TheSportsDbSource {
    pub fn new(executor: RequestExecutor, base_url: &str, public_key: &str, settings: ExecutorSettings) -> Self {
        Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
            settings,
        }
    }
}

#[async_trait]
impl FixtureSource for TheSportsDbSource {
    async fn fetch_fixtures(&self, date: NaiveDate, _credential: Option<&str>) -> Result<Vec<Value>, SourceError> {
        let url = format!("{}/{}/eventsday.php", self.base_url, self.public_key);
        let options = RequestOptions::get()
            .query("d", date.format("%Y-%m-%d"))
            .query("s", "Soccer");
        let payload = self.executor.run(&url, &options, &self.settings).await.into_result()?;
        records_at(&payload, "events", NAME)
    }
}
