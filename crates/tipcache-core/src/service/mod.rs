//! The facade UI collaborators call.
//!
//! Every read goes cache-first, then to the network (backend or fixture
//! providers), then falls back to stale cache and finally to a typed-empty
//! default. Reads never return an error; the [`Outcome`] on each
//! [`Fetched`] tells "no data" apart from "fetch failed".

pub mod data_service;
pub mod fetched;

pub use data_service::{DataService, RefreshReport};
pub use fetched::{FetchOptions, Fetched, Outcome, ResourceData};
