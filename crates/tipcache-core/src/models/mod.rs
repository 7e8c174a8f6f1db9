//! Normalized records handed to UI collaborators.
//!
//! - `Prediction`: a tip on one match, denormalized with team/league names
//! - `Fixture`: a scheduled or played match from any fixture provider
//! - `StatsOverview`: aggregate prediction performance
//! - Admin reference data: `Punter`, `Bookmaker`, `BettingCode`

pub mod admin;
pub mod fixture;
pub mod prediction;
pub mod stats;

pub use admin::{AdminResource, BettingCode, Bookmaker, Punter};
pub use fixture::{Fixture, FixtureStatus};
pub use prediction::{Prediction, PredictionStatus};
pub use stats::StatsOverview;
