//! Property dump decoder.
//!
//! Accepts `getprop` output, one `[key]: [value]` pair per line. Lines that do
//! not fit the pattern are skipped.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::PropertyMap;

static PATTERNS: LazyLock<PropertyPatterns> = LazyLock::new(PropertyPatterns::new);

struct PropertyPatterns {
    // [ro.build.version.sdk]: [34]
    entry: Regex,
}

impl PropertyPatterns {
    fn new() -> Self {
        Self {
            entry: Regex::new(r"^\s*\[([^\]]+)\]:\s*\[(.*)\]\s*$")
                .expect("static regex must compile"),
        }
    }
}

/// Decodes a property dump. Never fails; garbage input yields an empty map.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::parser::props::parse_properties;
///
/// let props = parse_properties("[ro.product.model]: [Pixel 8]\nnoise\n[empty]: []\n");
/// assert_eq!(props.get("ro.product.model"), Some("Pixel 8"));
/// assert_eq!(props.get("empty"), Some(""));
/// assert_eq!(props.len(), 2);
/// ```
pub fn parse_properties(text: &str) -> PropertyMap {
    let mut props = PropertyMap::default();
    let mut skipped = 0usize;

    for line in text.lines() {
        match PATTERNS.entry.captures(line) {
            Some(caps) => props.insert(&caps[1], &caps[2]),
            None if line.trim().is_empty() => {}
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, decoded = props.len(), "Skipped malformed property lines");
    }
    props
}
