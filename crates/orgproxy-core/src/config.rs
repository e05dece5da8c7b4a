//! Factory configuration.
//!
//! Stored at `~/.config/orgproxy/config.json`. Every field has a default, so
//! a missing file or a partial file is fine.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for the config directory path
const APP_NAME: &str = "orgproxy";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Renew federated tokens this many minutes before they expire.
pub const DEFAULT_SAFETY_WINDOW_MINUTES: i64 = 10;

/// A zero timeout would fail every request before it is sent.
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Resolve richer type metadata for handles (one extra round trip)
    pub type_enrichment: bool,
    pub safety_window_minutes: i64,
    pub request_timeout_secs: u64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            type_enrichment: false,
            safety_window_minutes: DEFAULT_SAFETY_WINDOW_MINUTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl FactoryConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Negative values clamp to zero, values past what chrono can represent
    /// saturate at `TimeDelta::MAX`.
    pub fn safety_window(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.safety_window_minutes.max(0))
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(MIN_REQUEST_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FactoryConfig::default();
        assert!(!config.type_enrichment);
        assert_eq!(config.safety_window(), chrono::Duration::minutes(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: FactoryConfig = serde_json::from_str(r#"{"type_enrichment": true}"#).unwrap();
        assert!(config.type_enrichment);
        assert_eq!(config.safety_window_minutes, DEFAULT_SAFETY_WINDOW_MINUTES);
    }

    #[test]
    fn test_negative_window_clamped() {
        let config = FactoryConfig {
            safety_window_minutes: -5,
            ..Default::default()
        };
        assert_eq!(config.safety_window(), chrono::Duration::zero());
    }

    #[test]
    fn test_oversized_window_saturates() {
        let config: FactoryConfig =
            serde_json::from_str(r#"{"safety_window_minutes": 9000000000000000}"#).unwrap();
        assert_eq!(config.safety_window(), chrono::Duration::MAX);

        let config = FactoryConfig {
            safety_window_minutes: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.safety_window(), chrono::Duration::MAX);
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config: FactoryConfig =
            serde_json::from_str(r#"{"request_timeout_secs": 0}"#).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
