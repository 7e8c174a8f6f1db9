//! Normalization of heterogeneous upstream payloads.
//!
//! Every logical field has an ordered list of candidate source names in a
//! [`FieldTable`]; the first candidate holding a usable scalar wins. The
//! normalized (camelCase) name is always the first candidate so feeding a
//! normalized record back through yields the same record.
//!
//! Nothing here returns an error: a malformed record degrades to a
//! defaulted one instead of failing the batch.

pub mod field;
pub mod normalize;

pub use field::FieldTable;
pub use normalize::{
    extract_records, group_by_category, normalize_fixture, normalize_prediction, normalize_stats, FIXTURE_FIELDS,
    PREDICTION_FIELDS, STATS_FIELDS,
};
