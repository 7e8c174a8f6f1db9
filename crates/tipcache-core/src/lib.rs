//! Tipcache core - the resilient data-acquisition layer behind the
//! prediction dashboard.
//!
//! The crate is organised leaf-first:
//!
//! - [`cache`]: expiring key/value store with persistent, session and
//!   memory backends plus tag invalidation
//! - [`api`]: HTTP executor with bounded retries, hard timeouts and
//!   failure classification, and the backend REST client built on it
//! - [`sources`]: prioritized third-party fixture providers and the
//!   fallback resolver that walks them in order
//! - [`mapping`]: tolerant normalization of upstream payloads
//! - [`service`]: the facade UI collaborators call; never returns an error
//!
//! Configuration lives in [`config`], upstream credentials in [`auth`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod mapping;
pub mod models;
pub mod service;
pub mod sources;
pub mod utils;

pub use api::{ApiClient, ApiError, ExecutorSettings, RequestExecutor, RequestOptions, RequestOutcome};
pub use cache::{BackendKind, CacheKey, CacheManager, Ttl};
pub use config::Config;
pub use service::{DataService, FetchOptions, Fetched, Outcome};
pub use sources::{DataSourceDescriptor, FixtureSource, Resolution, SourceRegistry};
