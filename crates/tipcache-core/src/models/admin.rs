use serde::{Deserialize, Serialize};

use crate::cache::Ttl;

/// Admin-managed reference lists served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminResource {
    Punters,
    Bookmakers,
    BettingCodes,
}

impl AdminResource {
    /// REST collection path under the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            AdminResource::Punters => "punters",
            AdminResource::Bookmakers => "bookmakers",
            AdminResource::BettingCodes => "betting-codes",
        }
    }

    /// Cache tag shared by every entry derived from this collection
    pub fn tag(&self) -> &'static str {
        match self {
            AdminResource::Punters => "punters",
            AdminResource::Bookmakers => "bookmakers",
            AdminResource::BettingCodes => "betting-codes",
        }
    }

    /// Reference lists change rarely
    pub fn ttl(&self) -> Ttl {
        Ttl::Long
    }
}

impl std::fmt::Display for AdminResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Punter {
    #[serde(default, alias = "_id", deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, alias = "punter_name")]
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, alias = "win_rate")]
    pub win_rate: Option<f64>,
    #[serde(default, alias = "is_active")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bookmaker {
    #[serde(default, alias = "_id", deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, alias = "bookmaker_name")]
    pub name: String,
    #[serde(default, alias = "url")]
    pub website: Option<String>,
    #[serde(default, alias = "logo_url")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BettingCode {
    #[serde(default, alias = "_id", deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, alias = "betting_code")]
    pub code: String,
    #[serde(default, alias = "bookmaker_name")]
    pub bookmaker: Option<String>,
    #[serde(default, alias = "punter_name")]
    pub punter: Option<String>,
    #[serde(default, alias = "total_odds")]
    pub odds: Option<f64>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Backends disagree on numeric vs string ids; keep them as strings.
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }
}
