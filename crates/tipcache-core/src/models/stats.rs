use serde::{Deserialize, Serialize};

/// Aggregate prediction performance. `Default` is the zeroed overview shown
/// when nothing could be loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StatsOverview {
    pub total_predictions: u64,
    pub won: u64,
    pub lost: u64,
    pub pending: u64,
    /// Percentage of settled predictions that won, 0-100
    pub win_rate: f64,
    pub average_odds: f64,
}

impl StatsOverview {
    pub fn settled(&self) -> u64 {
        self.won + self.lost
    }

    pub fn win_rate_display(&self) -> String {
        format!("{:.1}%", self.win_rate)
    }
}
