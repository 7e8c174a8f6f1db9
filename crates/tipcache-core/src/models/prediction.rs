use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{format_match_date, format_odds};

/// Placeholder used when an upstream record carries no team name.
pub const UNKNOWN_TEAM: &str = "TBD";

/// Placeholder used when an upstream record carries no league name.
pub const UNKNOWN_LEAGUE: &str = "Unknown League";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionStatus {
    Pending,
    Won,
    Lost,
    Void,
}

impl PredictionStatus {
    /// Map the many spellings upstream uses onto a settled state.
    /// Anything unrecognised is still pending.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "won" | "win" | "w" | "success" | "correct" => PredictionStatus::Won,
            "lost" | "loss" | "lose" | "l" | "failed" | "wrong" => PredictionStatus::Lost,
            "void" | "refund" | "cancelled" | "canceled" | "push" => PredictionStatus::Void,
            _ => PredictionStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Won => "won",
            PredictionStatus::Lost => "lost",
            PredictionStatus::Void => "void",
        }
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Prediction {
    pub id: String,
    pub fixture_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub category: String,
    pub tip: String,
    pub odds: f64,
    pub confidence: f64,
    pub match_date: DateTime<Utc>,
    pub status: String,
    pub punter: Option<String>,
    pub bookmaker: Option<String>,
}

impl Prediction {
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn odds_display(&self) -> String {
        format_odds(self.odds)
    }

    pub fn formatted_date(&self) -> String {
        format_match_date(&self.match_date)
    }

    pub fn settled_status(&self) -> PredictionStatus {
        PredictionStatus::parse(&self.status)
    }
}
