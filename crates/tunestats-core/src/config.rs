//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tunestats/config.json` and may be
//! overridden per field by `TUNESTATS_*` environment variables. The
//! encryption key is never written to the config file; it comes from the
//! environment or the OS keychain.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::crypto::{CryptoCodec, CryptoError, KeyStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "tunestats";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const CLIENT_ID_ENV: &str = "TUNESTATS_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "TUNESTATS_CLIENT_SECRET";
pub const DATA_DIR_ENV: &str = "TUNESTATS_DATA_DIR";
pub const ENCRYPTION_KEY_ENV: &str = "TUNESTATS_ENCRYPTION_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache: CachePolicy,
}

impl Config {
    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from `lookup` (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty(CLIENT_ID_ENV) {
            self.client_id = Some(id);
        }
        if let Some(secret) = non_empty(CLIENT_SECRET_ENV) {
            self.client_secret = Some(secret);
        }
        if let Some(dir) = non_empty(DATA_DIR_ENV) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Directory holding user documents and the log file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn client_credentials(&self) -> Result<(String, String)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.clone(), secret.clone())),
            _ => anyhow::bail!(
                "Client credentials missing - set {} and {}",
                CLIENT_ID_ENV,
                CLIENT_SECRET_ENV
            ),
        }
    }

    /// Build the codec from the provisioned key.
    ///
    /// Looks in the environment first, then the keychain. Never generates a
    /// key; a missing key is `CryptoError::MissingKey`.
    pub fn codec(&self) -> Result<CryptoCodec, CryptoError> {
        Self::codec_from(std::env::var(ENCRYPTION_KEY_ENV).ok().or_else(KeyStore::get))
    }

    fn codec_from(key: Option<String>) -> Result<CryptoCodec, CryptoError> {
        let key = key.ok_or(CryptoError::MissingKey)?;
        CryptoCodec::from_base64(&key)
    }
}
