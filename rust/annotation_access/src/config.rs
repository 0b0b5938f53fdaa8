//! Access configuration.
//!
//! Loaded by the embedding service and handed to the resolver and repository
//! at construction. Missing fields take their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Page size used when a query asks for `limit = 0`.
    pub default_limit: usize,
    /// Expand folder grants to descendant folders (when the store can recurse).
    pub nested_folders: bool,
    /// Read dashboard and folder scopes from `annotations:read` itself instead
    /// of `dashboards:read`.
    pub annotation_permission_update: bool,
    /// Per-store deadline for composite fan-out. `None` waits indefinitely.
    pub store_timeout_ms: Option<u64>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            nested_folders: true,
            annotation_permission_update: false,
            store_timeout_ms: None,
        }
    }
}

impl AccessConfig {
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be positive".into()));
        }
        if self.store_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("store_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Parse and validate an access config from JSON.
pub fn parse_access_config(json: &str) -> Result<AccessConfig, ConfigError> {
    let config: AccessConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = parse_access_config("{}").unwrap();
        assert_eq!(config, AccessConfig::default());
        assert_eq!(config.default_limit, 100);
        assert!(config.nested_folders);
        assert!(config.store_timeout().is_none());
    }

    #[test]
    fn parse_overrides() {
        let json = r#"{"default_limit":25,"nested_folders":false,"annotation_permission_update":true,"store_timeout_ms":250}"#;
        let config = parse_access_config(json).unwrap();
        assert_eq!(config.default_limit, 25);
        assert!(!config.nested_folders);
        assert!(config.annotation_permission_update);
        assert_eq!(config.store_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn reject_invalid_values() {
        assert!(matches!(
            parse_access_config(r#"{"default_limit":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_access_config(r#"{"store_timeout_ms":0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_access_config(r#"{"default_limit":"many"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
