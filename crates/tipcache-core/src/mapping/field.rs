use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Ordered candidate names per logical field.
///
/// Candidates may be dotted paths (`teams.home.name`) to reach into nested
/// objects. Nulls, empty strings and non-scalar values are skipped so a later
/// candidate gets its chance.
#[derive(Debug, Clone, Copy)]
pub struct FieldTable {
    fields: &'static [(&'static str, &'static [&'static str])],
}

impl FieldTable {
    pub const fn new(fields: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { fields }
    }

    /// Candidate names for a logical field, empty if the field is unknown
    pub fn candidates(&self, field: &str) -> &'static [&'static str] {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, candidates)| *candidates)
            .unwrap_or(&[])
    }

    /// Logical field names in table order
    pub fn fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|(name, _)| *name)
    }

    /// First usable scalar for `field`
    pub fn scalar<'a>(&self, record: &'a Value, field: &str) -> Option<&'a Value> {
        self.candidates(field)
            .iter()
            .filter_map(|path| lookup(record, path))
            .find(|value| is_usable(value))
    }

    pub fn string(&self, record: &Value, field: &str) -> Option<String> {
        self.scalar(record, field).map(|value| match value {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
    }

    /// Numbers and numeric strings ("1.85") are both accepted
    pub fn number(&self, record: &Value, field: &str) -> Option<f64> {
        self.candidates(field)
            .iter()
            .filter_map(|path| lookup(record, path))
            .find_map(as_f64)
    }

    pub fn datetime(&self, record: &Value, field: &str) -> Option<DateTime<Utc>> {
        self.candidates(field)
            .iter()
            .filter_map(|path| lookup(record, path))
            .find_map(as_datetime)
    }
}

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, segment| current.get(segment))
}

fn is_usable(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Accepts RFC 3339, "YYYY-MM-DD HH:MM:SS", "YYYY-MM-DDTHH:MM:SS" (UTC assumed),
/// bare dates and unix timestamps in seconds.
fn as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
        Value::String(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
