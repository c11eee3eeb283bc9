//! Configuration for the feature service hub
//!
//! Handles the integrator-supplied per-provider configuration table and
//! render orchestration settings. How configuration values are sourced
//! beyond this boundary is out of scope.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::hub::types::HubError;

/// Render orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderConfig {
    /// Whole-operation render timeout in milliseconds.
    ///
    /// Absent means unbounded; the orchestrator warns once about the
    /// unbounded-wait risk.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RenderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HubConfig {
    /// Per-provider configuration values, keyed by provider id.
    ///
    /// An id absent from the table means its provider receives no config,
    /// which is not an error.
    #[serde(default)]
    pub feature_service_configs: HashMap<String, serde_json::Value>,

    /// Render orchestration settings
    #[serde(default)]
    pub render: RenderConfig,
}

impl HubConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HubError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HubError::InvalidConfig(format!("failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| HubError::InvalidConfig(format!("failed to parse config TOML: {}", e)))
    }

    /// Configuration value for a provider id, if any
    pub fn provider_config(&self, id: &str) -> Option<&serde_json::Value> {
        self.feature_service_configs.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert!(config.feature_service_configs.is_empty());
        assert!(config.render.timeout().is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config: HubConfig = toml::from_str(
            r#"
            [render]
            timeout_ms = 5000

            [feature_service_configs.logger]
            level = "debug"

            [feature_service_configs.cache]
            capacity = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.render.timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(
            config.provider_config("logger").unwrap()["level"],
            serde_json::json!("debug")
        );
        assert_eq!(
            config.provider_config("cache").unwrap()["capacity"],
            serde_json::json!(128)
        );
        assert!(config.provider_config("absent").is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "[render]\ntimeout_ms = 250\n").unwrap();

        let config = HubConfig::from_file(&path).unwrap();
        assert_eq!(config.render.timeout(), Some(Duration::from_millis(250)));

        let err = HubConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, HubError::InvalidConfig(_)));
    }
}
