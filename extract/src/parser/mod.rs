//! Report extractors for Android diagnostic shell output.
//!
//! Each submodule turns one kind of loosely formatted dump into a typed
//! result from `dumpscope-core`:
//!
//! - [`props`]: `[key]: [value]` property dumps (`getprop`)
//! - [`table`]: fixed-column process/thread listings (`ps -T`)
//! - [`activity`]: multi-activity dumps (`dumpsys activity top`), with
//!   [`fragment`] rebuilding each activity's Fragment tree
//! - [`gfx`]: global and per-window frame metrics (`dumpsys gfxinfo`)
//! - [`cpu`]: load, sampling window and per-process CPU (`dumpsys cpuinfo`)
//!
//! # Failure model
//!
//! Extractors never fail. A missing section degrades that part of the result
//! to its default, a malformed row is dropped or degraded, and an unparseable
//! number becomes zero. An input that is empty and an input that is garbage
//! produce the same default result, so callers cannot tell "device returned
//! nothing" apart from "device returned something unparseable".
//!
//! Every field pattern is a named member of a per-module `PATTERNS` table so
//! the accepted formats can be audited and tested in one place.

pub mod activity;
pub mod cpu;
pub mod fragment;
pub mod gfx;
pub mod props;
pub mod table;

use regex::Regex;
use tracing::warn;

use crate::error::{ExtractError, Result};

/// Progress of a line scanner that collects a contiguous run of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Looking for the line that opens a run.
    #[default]
    Scanning,
    /// Inside a run; each line is either taken or ends the run.
    Collecting,
    /// The run has ended.
    Closed,
}

/// Rejects input that has no non-whitespace content.
pub(crate) fn require_content(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(ExtractError::EmptyInput);
    }
    Ok(text)
}

/// Unwraps an extractor result, replacing an error with the default value.
pub(crate) fn or_default<T: Default>(kind: &'static str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(ExtractError::EmptyInput) => T::default(),
        Err(e) => {
            warn!(kind, error = %e, "Extraction failed, returning default result");
            T::default()
        }
    }
}

/// Returns capture group `group` of the first match of `re` in `text`.
pub(crate) fn capture<'t>(re: &Regex, text: &'t str, group: usize) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str())
}

pub(crate) fn parse_f64_or_zero(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}

pub(crate) fn parse_u64_or_zero(value: &str) -> u64 {
    value.trim().parse::<u64>().unwrap_or(0)
}

pub(crate) fn parse_i64_or_zero(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

pub(crate) fn parse_bool_or(value: Option<&str>, default: bool) -> bool {
    match value {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_helpers_default_to_zero() {
        assert_eq!(parse_f64_or_zero(" 3.25 "), 3.25);
        assert_eq!(parse_f64_or_zero("n/a"), 0.0);
        assert_eq!(parse_u64_or_zero("-4"), 0);
        assert_eq!(parse_i64_or_zero("-4"), -4);
        assert_eq!(parse_i64_or_zero(""), 0);
    }

    #[test]
    fn test_parse_bool_or() {
        assert!(parse_bool_or(Some("true"), false));
        assert!(!parse_bool_or(Some("false"), true));
        assert!(parse_bool_or(Some("yes"), true));
        assert!(!parse_bool_or(None, false));
    }

    #[test]
    fn test_require_content() {
        assert_eq!(require_content("  \n\t"), Err(ExtractError::EmptyInput));
        assert_eq!(require_content("x"), Ok("x"));
    }

    #[test]
    fn test_or_default_swallows_errors() {
        let value: Vec<u8> = or_default("test", Err(ExtractError::MissingSection("x")));
        assert!(value.is_empty());
        assert_eq!(or_default("test", Ok(7u8)), 7);
    }
}
