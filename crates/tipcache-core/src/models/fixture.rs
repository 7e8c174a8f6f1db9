use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_match_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl FixtureStatus {
    /// Providers use short codes ("NS", "FT", "1H"), SCREAMING_CASE ("IN_PLAY")
    /// or prose ("Match Finished"). Unknown values yield `None` so the caller
    /// can keep the raw string.
    pub fn parse(raw: &str) -> Option<Self> {
        let status = match raw.trim().to_ascii_uppercase().as_str() {
            "" | "NS" | "TBD" | "SCHEDULED" | "TIMED" | "NOT STARTED" => FixtureStatus::Scheduled,
            "1H" | "2H" | "HT" | "ET" | "BT" | "P" | "LIVE" | "IN_PLAY" | "PAUSED" | "IN PLAY" => {
                FixtureStatus::Live
            }
            "FT" | "AET" | "PEN" | "FINISHED" | "MATCH FINISHED" | "AWARDED" => FixtureStatus::Finished,
            "PST" | "POSTPONED" | "SUSP" | "SUSPENDED" => FixtureStatus::Postponed,
            "CANC" | "CANCELLED" | "CANCELED" | "ABD" | "ABANDONED" => FixtureStatus::Cancelled,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureStatus::Scheduled => "scheduled",
            FixtureStatus::Live => "live",
            FixtureStatus::Finished => "finished",
            FixtureStatus::Postponed => "postponed",
            FixtureStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Fixture {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub match_date: DateTime<Utc>,
    pub status: String,
    /// Name of the provider that served this record
    pub source: String,
}

impl Fixture {
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn formatted_date(&self) -> String {
        format_match_date(&self.match_date)
    }

    pub fn is_live(&self) -> bool {
        FixtureStatus::parse(&self.status) == Some(FixtureStatus::Live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_status_parse() {
        assert_eq!(FixtureStatus::parse("NS"), Some(FixtureStatus::Scheduled));
        assert_eq!(FixtureStatus::parse("IN_PLAY"), Some(FixtureStatus::Live));
        assert_eq!(FixtureStatus::parse("Match Finished"), Some(FixtureStatus::Finished));
        assert_eq!(FixtureStatus::parse("pst"), Some(FixtureStatus::Postponed));
        assert_eq!(FixtureStatus::parse("weird"), None);
        assert_eq!(FixtureStatus::parse("live"), Some(FixtureStatus::Live));
    }
}
