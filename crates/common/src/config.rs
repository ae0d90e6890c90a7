use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKUP_WORKERS: usize = 8;
pub const DEFAULT_MAX_PATH_LEN: usize = 4096;
pub const DEFAULT_MAX_NAME_LEN: usize = 255;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lookup_workers must be at least 1")]
    NoWorkers,
    #[error("max_name_len ({name}) must be non-zero and below max_path_len ({path})")]
    InvalidLimits { name: usize, path: usize },
    #[error("lookup_timeout_ms must be non-zero when set")]
    ZeroTimeout,
}

/// Tunables of a merge view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Number of worker tasks draining the lookup queue
    pub lookup_workers: usize,
    /// Per-device lookup timeout. Unset means wait forever.
    pub lookup_timeout_ms: Option<u64>,
    /// Longest backing path the view will construct
    pub max_path_len: usize,
    /// Longest display name accepted by lookups
    pub max_name_len: usize,
    /// Top-level names whose nodes always revalidate as valid
    pub trusted_roots: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            lookup_workers: DEFAULT_LOOKUP_WORKERS,
            lookup_timeout_ms: None,
            max_path_len: DEFAULT_MAX_PATH_LEN,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            trusted_roots: Vec::new(),
        }
    }
}

impl MergeConfig {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_ms.map(Duration::from_millis)
    }

    pub fn is_trusted(&self, name: &str) -> bool {
        self.trusted_roots.iter().any(|t| t == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_name_len == 0 || self.max_name_len >= self.max_path_len {
            return Err(ConfigError::InvalidLimits {
                name: self.max_name_len,
                path: self.max_path_len,
            });
        }
        if self.lookup_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MergeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lookup_timeout(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MergeConfig =
            serde_json::from_str(r#"{"lookup_timeout_ms": 250, "trusted_roots": ["system"]}"#)
                .unwrap();
        assert_eq!(config.lookup_workers, DEFAULT_LOOKUP_WORKERS);
        assert_eq!(config.lookup_timeout(), Some(Duration::from_millis(250)));
        assert!(config.is_trusted("system"));
        assert!(!config.is_trusted("docs"));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let config = MergeConfig {
            lookup_workers: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));

        let config = MergeConfig {
            max_name_len: 5000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLimits { .. })
        ));
    }
}
