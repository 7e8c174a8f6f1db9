use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

/// Keychain service holding the upstream fixture-provider key
const SERVICE_NAME: &str = "tipcache-fixture-api";

/// Single account name; there is one upstream key per user
const ACCOUNT: &str = "default";

/// Environment override for the upstream key
pub const ENV_FIXTURE_API_KEY: &str = "TIPCACHE_FIXTURE_API_KEY";

/// Upstream API credential in the OS keychain, kept apart from the cache
/// namespace.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the fixture API key in the OS keychain
    pub fn store(key: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, ACCOUNT).context("Failed to create keyring entry")?;
        entry
            .set_password(key.trim())
            .context("Failed to store API key in keychain")?;
        Ok(())
    }

    pub fn get() -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, ACCOUNT).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve API key from keychain")
    }

    pub fn delete() -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, ACCOUNT).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete API key from keychain")?;
        Ok(())
    }

    /// The key to use for credentialed providers: the environment override
    /// first, then the keychain. `None` when neither has a non-blank value.
    pub fn resolve() -> Option<String> {
        Self::resolve_with(|name| std::env::var(name).ok(), Self::get)
    }

    fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        keychain: impl FnOnce() -> Result<String>,
    ) -> Option<String> {
        if let Some(key) = non_blank(env(ENV_FIXTURE_API_KEY)) {
            return Some(key);
        }
        match keychain() {
            Ok(key) => non_blank(Some(key)),
            Err(e) => {
                debug!(error = %e, "No fixture API key in keychain");
                None
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
