//! HTTP access to upstream services.
//!
//! - `RequestExecutor`: one network call with bounded retries, a hard
//!   timeout and failure classification into a `RequestOutcome`
//! - `ApiClient`: the prediction backend's REST endpoints on top of it
//!
//! Only server errors and timeouts are retried, and only for idempotent
//! methods. Client errors return immediately; network failures are left to
//! the caller (the fallback resolver tries another source instead).

pub mod client;
pub mod error;
pub mod executor;
pub mod outcome;

pub use client::ApiClient;
pub use error::ApiError;
pub use executor::{ExecutorSettings, RequestExecutor, RequestOptions};
pub use outcome::RequestOutcome;
