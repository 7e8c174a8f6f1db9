use chrono::{DateTime, Utc};

/// Format decimal odds for display, e.g. `1.85`.
/// Zero or negative odds mean "unknown" and render as a dash.
pub fn format_odds(odds: f64) -> String {
    if odds.is_finite() && odds > 0.0 {
        format!("{:.2}", odds)
    } else {
        "-".to_string()
    }
}

/// Format a kickoff time: "May 01, 2024 19:45"
pub fn format_match_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y %H:%M").to_string()
}

/// Human readable age for freshness badges ("just now", "5m ago", "2h ago", "3d ago").
pub fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew (negative ages)
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
