//! Client configuration management.
//!
//! Holds the login endpoint, the server's protocol codes and where the
//! session is persisted. Configuration is stored at
//! `~/.config/wxsession/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_SKEY_EXPIRED_CODE, DEFAULT_SUCCESS_CODE};
use crate::session::{FileStorage, KeyringStorage, MemoryStorage, SessionStore};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "wxsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Keychain account under which the session is stored
const KEYRING_ACCOUNT: &str = "session";

/// Where the cached session is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server endpoint that exchanges a login ticket for a session
    pub login_url: Option<String>,
    /// HTTP method used for the login exchange
    pub login_method: String,
    /// `code` value the server uses for success
    pub success_code: i64,
    /// `code` value the server uses for an expired skey
    pub skey_expired_code: i64,
    pub request_timeout_secs: u64,
    pub session_backend: SessionBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            login_url: None,
            login_method: Method::GET.to_string(),
            success_code: DEFAULT_SUCCESS_CODE,
            skey_expired_code: DEFAULT_SKEY_EXPIRED_CODE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            session_backend: SessionBackend::default(),
        }
    }
}

impl Config {
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = Some(login_url.into());
        self
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
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

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn login_method(&self) -> Result<Method> {
        Method::from_bytes(self.login_method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("Invalid login method: {}", self.login_method))
    }

    /// Build the session store for the configured backend
    pub fn open_session_store(&self) -> Result<SessionStore> {
        let store = match self.session_backend {
            SessionBackend::File => SessionStore::open(FileStorage::new(Self::cache_dir()?)),
            SessionBackend::Keyring => {
                SessionStore::open(KeyringStorage::new(APP_NAME, KEYRING_ACCOUNT))
            }
            SessionBackend::Memory => SessionStore::open(MemoryStorage::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.login_url.is_none());
        assert_eq!(config.login_method().expect("method"), Method::GET);
        assert_eq!(config.success_code, 0);
        assert_eq!(config.skey_expired_code, 60012);
        assert_eq!(config.session_backend, SessionBackend::File);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"login_url": "https://api.example.com/login", "session_backend": "keyring"}"#,
        )
        .expect("parse");
        assert_eq!(config.login_url.as_deref(), Some("https://api.example.com/login"));
        assert_eq!(config.session_backend, SessionBackend::Keyring);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wxsession").join("config.json");

        assert!(Config::load_from(&path).expect("load missing").login_url.is_none());

        let mut config = Config::default().with_login_url("https://api.example.com/login");
        config.login_method = "post".to_string();
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.login_url, config.login_url);
        assert_eq!(loaded.login_method().expect("method"), Method::POST);
    }

    #[test]
    fn test_invalid_login_method() {
        let config = Config {
            login_method: "NOT A METHOD".to_string(),
            ..Config::default()
        };
        assert!(config.login_method().is_err());
    }
}
