//! # Runtime Configuration
//!
//! Layered the usual way: `Default`, then an optional JSON file named by
//! `OVI_CONFIG`, then individual `OVI_*` environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `OVI_BLOCK_READY_CHANNEL` | `dispatcher.block_ready_channel` |
//! | `OVI_BLOCK_REVERTED_CHANNEL` | `dispatcher.block_reverted_channel` |
//! | `OVI_REVERT_ORDER` | `dispatcher.revert_order` |
//! | `OVI_UNDO_RETENTION_BLOCKS` | `dispatcher.undo_retention_blocks` |
//! | `OVI_BUS_CAPACITY` | `bus_capacity` |
//! | `OVI_LOG` | `log_filter` |
//! | `OVI_FIXTURES` | `fixtures` |

use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vault_event_processor::{ConfigError, DispatcherConfig};

/// Environment variable naming the JSON config file.
pub const CONFIG_FILE_VAR: &str = "OVI_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("Failed to read config file {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Bus capacity must be greater than zero")]
    ZeroBusCapacity,

    #[error(transparent)]
    Dispatcher(#[from] ConfigError),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    /// Notifications buffered per subscriber before it lags.
    pub bus_capacity: usize,
    /// `tracing` filter directive, e.g. `info,vault_event_processor=debug`.
    pub log_filter: String,
    /// Vault seeds and pre-ingested events to load at startup.
    pub fixtures: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_filter: "info".to_string(),
            fixtures: None,
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, RuntimeConfigError> {
        let lookup = |var: &str| std::env::var(var).ok();
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| RuntimeConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| RuntimeConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `OVI_*` overrides found through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), RuntimeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(channel) = lookup("OVI_BLOCK_READY_CHANNEL") {
            self.dispatcher.block_ready_channel = channel;
        }
        if let Some(channel) = lookup("OVI_BLOCK_REVERTED_CHANNEL") {
            self.dispatcher.block_reverted_channel = channel;
        }
        if let Some(order) = lookup("OVI_REVERT_ORDER") {
            self.dispatcher.revert_order = order.parse()?;
        }
        if let Some(depth) = lookup("OVI_UNDO_RETENTION_BLOCKS") {
            self.dispatcher.undo_retention_blocks =
                depth
                    .trim()
                    .parse()
                    .map_err(|_| RuntimeConfigError::InvalidValue {
                        var: "OVI_UNDO_RETENTION_BLOCKS",
                        value: depth.clone(),
                    })?;
        }
        if let Some(capacity) = lookup("OVI_BUS_CAPACITY") {
            self.bus_capacity =
                capacity
                    .trim()
                    .parse()
                    .map_err(|_| RuntimeConfigError::InvalidValue {
                        var: "OVI_BUS_CAPACITY",
                        value: capacity.clone(),
                    })?;
        }
        if let Some(filter) = lookup("OVI_LOG") {
            self.log_filter = filter;
        }
        if let Some(path) = lookup("OVI_FIXTURES") {
            self.fixtures = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RuntimeConfigError> {
        self.dispatcher.validate()?;
        if self.bus_capacity == 0 {
            return Err(RuntimeConfigError::ZeroBusCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vault_event_processor::RevertOrder;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.fixtures.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RuntimeConfig::default();
        config
            .apply_overrides(env(&[
                ("OVI_BLOCK_READY_CHANNEL", "ready"),
                ("OVI_REVERT_ORDER", "Stored"),
                ("OVI_BUS_CAPACITY", " 16 "),
                ("OVI_UNDO_RETENTION_BLOCKS", "0"),
                ("OVI_FIXTURES", "/tmp/fixtures.json"),
            ]))
            .unwrap();

        assert_eq!(config.dispatcher.block_ready_channel, "ready");
        assert_eq!(config.dispatcher.block_reverted_channel, "revert_block");
        assert_eq!(config.dispatcher.revert_order, RevertOrder::Stored);
        assert_eq!(config.bus_capacity, 16);
        assert_eq!(config.dispatcher.undo_retention_blocks, 0);
        assert_eq!(config.fixtures, Some(PathBuf::from("/tmp/fixtures.json")));
    }

    #[test]
    fn test_bad_overrides_rejected() {
        let mut config = RuntimeConfig::default();
        assert!(matches!(
            config.apply_overrides(env(&[("OVI_BUS_CAPACITY", "lots")])),
            Err(RuntimeConfigError::InvalidValue {
                var: "OVI_BUS_CAPACITY",
                ..
            })
        ));
        assert!(matches!(
            config.apply_overrides(env(&[("OVI_UNDO_RETENTION_BLOCKS", "-3")])),
            Err(RuntimeConfigError::InvalidValue {
                var: "OVI_UNDO_RETENTION_BLOCKS",
                ..
            })
        ));
        assert!(matches!(
            config.apply_overrides(env(&[("OVI_REVERT_ORDER", "sideways")])),
            Err(RuntimeConfigError::Dispatcher(ConfigError::InvalidRevertOrder { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_same_channel_and_zero_capacity() {
        let mut config = RuntimeConfig::default();
        config
            .apply_overrides(env(&[("OVI_BLOCK_READY_CHANNEL", "revert_block")]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(RuntimeConfigError::Dispatcher(ConfigError::DuplicateChannel { .. }))
        ));

        let config = RuntimeConfig {
            bus_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RuntimeConfigError::ZeroBusCapacity)
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!(
            "ovi-config-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{ "bus_capacity": 64, "dispatcher": { "revert_order": "stored" } }"#,
        )
        .unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.bus_capacity, 64);
        assert_eq!(config.dispatcher.revert_order, RevertOrder::Stored);
        assert_eq!(config.dispatcher.block_ready_channel, "new_block");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        assert!(matches!(
            RuntimeConfig::from_file(Path::new("/nonexistent/ovi.json")),
            Err(RuntimeConfigError::Read { .. })
        ));
    }
}
