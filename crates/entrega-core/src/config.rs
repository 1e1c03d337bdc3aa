//! Platform configuration and CLI preferences.
//!
//! The hosted backend is addressed by two externally-supplied values: the
//! service base URL and the public (anonymous) API key. Both are read from
//! the environment at startup. CLI preferences (the last signed-in email)
//! are stored at `~/.config/entrega/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variable holding the service base URL.
pub const ENV_API_URL: &str = "ENTREGA_API_URL";

/// Environment variable holding the public API key.
pub const ENV_ANON_KEY: &str = "ENTREGA_ANON_KEY";

/// Application name used for config directory paths
const APP_NAME: &str = "entrega";

/// Preferences file name
const CONFIG_FILE: &str = "config.json";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Public API key, sent as the `apikey` header on every request and
    /// used as the bearer fallback for anonymous access.
    pub anon_key: String,
}

impl PlatformConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            anon_key: anon_key.into(),
        }
    }

    /// Load the connection settings from the environment.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(ENV_API_URL)
            .map_err(|_| anyhow::anyhow!("{} is not set", ENV_API_URL))?;
        let anon_key = std::env::var(ENV_ANON_KEY)
            .map_err(|_| anyhow::anyhow!("{} is not set", ENV_ANON_KEY))?;
        Ok(Self::new(base_url, anon_key))
    }
}

/// Persisted CLI preferences.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub last_email: Option<String>,
}

impl Preferences {
    pub fn load() -> Result<Self> {
        let path = Self::preferences_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::preferences_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn preferences_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = PlatformConfig::new("https://project.example.co/", "anon-key");
        assert_eq!(config.base_url, "https://project.example.co");

        let config = PlatformConfig::new("https://project.example.co", "anon-key");
        assert_eq!(config.base_url, "https://project.example.co");
    }

    #[test]
    fn test_preferences_roundtrip_json() {
        let prefs = Preferences {
            last_email: Some("ana@example.com".to_string()),
        };
        let json = serde_json::to_string(&prefs).expect("serialize preferences");
        let back: Preferences = serde_json::from_str(&json).expect("parse preferences");
        assert_eq!(back.last_email.as_deref(), Some("ana@example.com"));
    }
}
