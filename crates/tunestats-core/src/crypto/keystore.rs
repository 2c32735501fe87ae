use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "tunestats";

/// Keychain account under which the encryption key is stored.
const KEY_ACCOUNT: &str = "encryption-key";

/// OS keychain storage for the provisioned encryption key.
pub struct KeyStore;

impl KeyStore {
    /// Store the encryption key in the OS keychain
    pub fn store(key: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, KEY_ACCOUNT)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(key)
            .context("Failed to store encryption key in keychain")?;
        Ok(())
    }

    /// Retrieve the encryption key, if one was provisioned
    pub fn get() -> Option<String> {
        Entry::new(SERVICE_NAME, KEY_ACCOUNT)
            .and_then(|entry| entry.get_password())
            .ok()
    }
}
