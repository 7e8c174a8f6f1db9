use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::FieldTable;
use crate::models::prediction::{UNKNOWN_LEAGUE, UNKNOWN_TEAM};
use crate::models::{Fixture, FixtureStatus, Prediction, PredictionStatus, StatsOverview};

/// Envelope keys the backend and providers wrap record lists in.
const ENVELOPE_KEYS: &[&str] = &["data", "results", "predictions", "items", "response", "matches", "events"];

pub const PREDICTION_FIELDS: FieldTable = FieldTable::new(&[
    ("id", &["id", "_id", "predictionId", "prediction_id"]),
    ("fixtureId", &["fixtureId", "fixture_id", "fixture.id", "matchId", "match_id"]),
    ("homeTeam", &["homeTeam", "home_team", "homeTeam.name", "teams.home.name", "home", "fixture.homeTeam"]),
    ("awayTeam", &["awayTeam", "away_team", "awayTeam.name", "teams.away.name", "away", "fixture.awayTeam"]),
    ("league", &["league", "league_name", "leagueName", "league.name", "competition", "competition.name"]),
    ("category", &["category", "prediction_type", "predictionType", "type", "market"]),
    ("tip", &["tip", "prediction", "pick", "selection"]),
    ("odds", &["odds", "odd", "price", "prediction_odds"]),
    ("confidence", &["confidence", "probability", "confidence_level"]),
    ("matchDate", &["matchDate", "match_date", "date", "kickoff", "fixture.date", "utcDate", "start_time"]),
    ("status", &["status", "result", "outcome"]),
    ("punter", &["punter", "punter_name", "punter.name", "tipster"]),
    ("bookmaker", &["bookmaker", "bookmaker_name", "bookmaker.name"]),
]);

pub const FIXTURE_FIELDS: FieldTable = FieldTable::new(&[
    ("id", &["id", "fixture.id", "idEvent", "matchId", "match_id"]),
    ("homeTeam", &["homeTeam", "home_team", "teams.home.name", "homeTeam.name", "strHomeTeam"]),
    ("awayTeam", &["awayTeam", "away_team", "teams.away.name", "awayTeam.name", "strAwayTeam"]),
    ("league", &["league", "league.name", "competition.name", "strLeague", "league_name"]),
    ("matchDate", &["matchDate", "match_date", "fixture.date", "utcDate", "strTimestamp", "dateEvent", "date"]),
    ("status", &["status", "fixture.status.short", "status.short", "strStatus"]),
]);

pub const STATS_FIELDS: FieldTable = FieldTable::new(&[
    ("totalPredictions", &["totalPredictions", "total_predictions", "total"]),
    ("won", &["won", "wins", "total_won", "totalWon"]),
    ("lost", &["lost", "losses", "total_lost", "totalLost"]),
    ("pending", &["pending", "total_pending", "totalPending"]),
    ("winRate", &["winRate", "win_rate", "accuracy", "success_rate"]),
    ("averageOdds", &["averageOdds", "average_odds", "avg_odds", "avgOdds"]),
]);

/// Pull the record list out of a response, whether it is a bare array or
/// wrapped in one of the usual envelope keys. Anything else is no records.
pub fn extract_records(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::Array(items)) => Some(items.clone()),
                Some(nested @ Value::Object(_)) => Some(extract_records(nested)),
                _ => None,
            })
            .unwrap_or_default(),
        _ => {
            debug!("Payload is neither a list nor an envelope; treating as empty");
            Vec::new()
        }
    }
}

pub fn normalize_prediction(record: &Value, now: DateTime<Utc>) -> Prediction {
    let t = &PREDICTION_FIELDS;
    let home_team = t.string(record, "homeTeam").unwrap_or_else(|| UNKNOWN_TEAM.to_string());
    let away_team = t.string(record, "awayTeam").unwrap_or_else(|| UNKNOWN_TEAM.to_string());
    let match_date = t.datetime(record, "matchDate").unwrap_or(now);
    let id = t
        .string(record, "id")
        .unwrap_or_else(|| synthetic_id(&home_team, &away_team, &match_date));

    Prediction {
        id,
        fixture_id: t.string(record, "fixtureId"),
        home_team,
        away_team,
        league: t.string(record, "league").unwrap_or_else(|| UNKNOWN_LEAGUE.to_string()),
        category: t
            .string(record, "category")
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or_else(|| "general".to_string()),
        tip: t.string(record, "tip").unwrap_or_default(),
        odds: t.number(record, "odds").unwrap_or(0.0),
        confidence: t.number(record, "confidence").unwrap_or(0.0),
        match_date,
        status: t
            .string(record, "status")
            .map(|s| PredictionStatus::parse(&s))
            .unwrap_or(PredictionStatus::Pending)
            .as_str()
            .to_string(),
        punter: t.string(record, "punter"),
        bookmaker: t.string(record, "bookmaker"),
    }
}

/// Normalize one provider record. `source` names the provider and is always
/// stamped on the result.
pub fn normalize_fixture(record: &Value, source: &str, now: DateTime<Utc>) -> Fixture {
    let t = &FIXTURE_FIELDS;
    let home_team = t.string(record, "homeTeam").unwrap_or_else(|| UNKNOWN_TEAM.to_string());
    let away_team = t.string(record, "awayTeam").unwrap_or_else(|| UNKNOWN_TEAM.to_string());
    let match_date = t.datetime(record, "matchDate").unwrap_or(now);
    let id = t
        .string(record, "id")
        .unwrap_or_else(|| synthetic_id(&home_team, &away_team, &match_date));
    let status = match t.string(record, "status") {
        Some(raw) => FixtureStatus::parse(&raw)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| raw.to_ascii_lowercase()),
        None => FixtureStatus::Scheduled.as_str().to_string(),
    };

    Fixture {
        id,
        home_team,
        away_team,
        league: t.string(record, "league").unwrap_or_else(|| UNKNOWN_LEAGUE.to_string()),
        match_date,
        status,
        source: source.to_string(),
    }
}

pub fn normalize_stats(record: &Value) -> StatsOverview {
    let t = &STATS_FIELDS;
    // Float to int casts saturate, so oversized counts land on u64::MAX
    let count = |field: &str| t.number(record, field).map(|n| n.max(0.0) as u64).unwrap_or(0);

    let won = count("won");
    let lost = count("lost");
    let pending = count("pending");
    let total_predictions = match count("totalPredictions") {
        0 => won.saturating_add(lost).saturating_add(pending),
        total => total,
    };
    let win_rate = t.number(record, "winRate").unwrap_or_else(|| {
        let settled = won as f64 + lost as f64;
        if settled == 0.0 {
            0.0
        } else {
            won as f64 * 100.0 / settled
        }
    });

    StatsOverview {
        total_predictions,
        won,
        lost,
        pending,
        win_rate,
        average_odds: t.number(record, "averageOdds").unwrap_or(0.0),
    }
}

/// Group predictions by category, keeping upstream order inside each group.
pub fn group_by_category(predictions: Vec<Prediction>) -> BTreeMap<String, Vec<Prediction>> {
    let mut grouped: BTreeMap<String, Vec<Prediction>> = BTreeMap::new();
    for prediction in predictions {
        grouped.entry(prediction.category.clone()).or_default().push(prediction);
    }
    grouped
}

fn synthetic_id(home: &str, away: &str, date: &DateTime<Utc>) -> String {
    format!("{}-{}-{}", home, away, date.timestamp()).to_ascii_lowercase().replace(' ', "-")
}
