pub mod credentials;

pub use credentials::{CredentialStore, ENV_FIXTURE_API_KEY};
