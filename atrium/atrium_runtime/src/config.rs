//! Runtime configuration
//!
//! Handles loading and validating the host-supplied runtime configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use atrium_core::{ConfigError, PluginConfig, Result};

/// Configuration for an Atrium runtime instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory backing the file state store.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Per-plugin configuration overrides, keyed by plugin id and applied
    /// at registration.
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfig>,

    /// Capacity of each zone's state-change queue.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            plugins: HashMap::new(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file.
    ///
    /// No path or a missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());

            if !path.exists() {
                warn!("Configuration file not found: {}", path.display());
                return Ok(config);
            }

            let content = fs::read_to_string(path).await?;
            config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("state directory cannot be empty".to_string()).into());
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel capacity cannot be zero".to_string()).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::Error;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_default_config() {
        let config = RuntimeConfig::load(None).await.unwrap();
        assert_eq!(config.state_dir, PathBuf::from("./state"));
        assert_eq!(config.channel_capacity, 64);
        assert!(config.plugins.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_file() {
        let file = NamedTempFile::new().unwrap();

        let config_json = r#"
        {
            "state_dir": "/tmp/atrium-state",
            "channel_capacity": 8,
            "plugins": {
                "clock": { "enabled": false, "position": "right" }
            }
        }
        "#;
        fs::write(file.path(), config_json).await.unwrap();

        let config = RuntimeConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/atrium-state"));
        assert_eq!(config.channel_capacity, 8);

        let clock = config.plugins.get("clock").unwrap();
        assert!(!clock.enabled);
        assert_eq!(clock.position.as_deref(), Some("right"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let config = RuntimeConfig::load(Some(Path::new("/nonexistent/atrium.json")))
            .await
            .unwrap();
        assert_eq!(config.channel_capacity, 64);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), r#"{ "channel_capacity": 0 }"#)
            .await
            .unwrap();

        let err = RuntimeConfig::load(Some(file.path())).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unparseable_config_rejected() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "not json").await.unwrap();

        let err = RuntimeConfig::load(Some(file.path())).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ParseFailed(_))));
    }
}
