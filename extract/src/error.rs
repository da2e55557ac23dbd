//! Error types for extraction, device access and configuration.
//!
//! [`ExtractError`] never escapes the public `parse_*` functions: they turn it
//! into the default result. [`DeviceError`] and [`ConfigError`] are the only
//! errors callers see.

use thiserror::Error;

/// Why an extractor gave up on a report or on one of its sections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The input was empty or only whitespace.
    #[error("empty input")]
    EmptyInput,

    /// A marker line the step depends on was not found.
    #[error("missing section: {0}")]
    MissingSection(&'static str),

    /// A line was found but did not match the expected pattern.
    #[error("malformed {field}: {line:?}")]
    Malformed { field: &'static str, line: String },
}

/// Failures running a command on the device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Spawning or waiting on the bridge process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge executable does not exist.
    #[error("executable not found: {0}")]
    NotFound(String),

    /// The command did not finish in time and was killed.
    #[error("command timed out after {timeout_ms}ms: {command}")]
    Timeout { command: String, timeout_ms: u64 },

    /// The command exited with a non-zero status.
    #[error("command failed with status {status:?}: {stderr}")]
    CommandFailed { status: Option<i32>, stderr: String },

    /// A canned runner has no response for the command.
    #[error("no response recorded for command: {0}")]
    NoResponse(String),

    /// A dump needs a target process that was not given or is not running.
    #[error("no running process for target: {0}")]
    NoProcess(String),
}

/// Failures loading or validating a [`MonitorConfig`](crate::config::MonitorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience alias for engine-internal results.
pub type Result<T> = std::result::Result<T, ExtractError>;
