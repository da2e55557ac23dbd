//! Monitor configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! target: com.example
//! device:
//!   adb_path: /opt/android-sdk/platform-tools/adb
//!   serial: emulator-5554
//!   timeout_ms: 10000
//! poll:
//!   interval_ms: 1500
//!   history_capacity: 60
//! parsing:
//!   table_policy: drop
//!   fragment_grouping: instance
//! ```

use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ExtractOptions;
use crate::error::ConfigError;
use crate::parser::activity::ActivityOptions;
use crate::parser::fragment::FragmentGrouping;
use crate::parser::table::{RowPolicy, TableOptions};

/// How to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Path to the `adb` executable.
    pub adb_path: PathBuf,
    /// Device serial, when more than one device is attached.
    pub serial: Option<String>,
    /// Per-command timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            serial: None,
            timeout_ms: 10_000,
        }
    }
}

/// Polling cadence and history size for `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub history_capacity: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_500,
            history_capacity: 60,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Extractor behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub table_policy: RowPolicy,
    pub fragment_grouping: FragmentGrouping,
}

impl From<ParsingConfig> for ExtractOptions {
    fn from(config: ParsingConfig) -> Self {
        Self {
            table: TableOptions {
                policy: config.table_policy,
            },
            activity: ActivityOptions {
                grouping: config.fragment_grouping,
            },
        }
    }
}

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::config::MonitorConfig;
///
/// let config = MonitorConfig::from_yaml("poll:\n  interval_ms: 1000\n").unwrap();
/// assert_eq!(config.poll.interval_ms, 1000);
/// assert_eq!(config.poll.history_capacity, 60);
/// assert_eq!(config.device.timeout_ms, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Package to focus on.
    pub target: Option<String>,
    pub device: DeviceConfig,
    pub poll: PollConfig,
    pub parsing: ParsingConfig,
}

impl MonitorConfig {
    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it does not parse, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut yaml = String::new();
        BufReader::new(std::fs::File::open(path)?).read_to_string(&mut yaml)?;
        Self::from_yaml(&yaml)
    }

    /// Parses and validates configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Rejects values that would make polling or capture meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be positive".into()));
        }
        if self.poll.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "poll.history_capacity must be positive".into(),
            ));
        }
        if self.device.timeout_ms == 0 {
            return Err(ConfigError::Invalid("device.timeout_ms must be positive".into()));
        }
        if self.target.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("target must not be blank".into()));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        self.parsing.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(MonitorConfig::from_yaml("").unwrap(), MonitorConfig::default());
        assert_eq!(MonitorConfig::from_yaml("{}").unwrap(), MonitorConfig::default());
    }

    #[test]
    fn test_parsing_switches() {
        let config = MonitorConfig::from_yaml(
            "parsing:\n  table_policy: degrade\n  fragment_grouping: class_name\n",
        )
        .unwrap();
        let options = config.extract_options();
        assert_eq!(options.table.policy, RowPolicy::Degrade);
        assert_eq!(options.activity.grouping, FragmentGrouping::ClassName);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for yaml in [
            "poll:\n  interval_ms: 0\n",
            "poll:\n  history_capacity: 0\n",
            "device:\n  timeout_ms: 0\n",
            "target: '  '\n",
        ] {
            let err = MonitorConfig::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}: {err}");
        }
    }

    #[test]
    fn test_unknown_policy_is_yaml_error() {
        let err = MonitorConfig::from_yaml("parsing:\n  table_policy: sometimes\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dumpscope.yaml");
        let config = MonitorConfig {
            target: Some("com.example".into()),
            device: DeviceConfig {
                serial: Some("emulator-5554".into()),
                ..DeviceConfig::default()
            },
            ..MonitorConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(MonitorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = MonitorConfig::load("/nonexistent/dumpscope.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
