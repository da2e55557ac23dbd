//! Graphics performance dump decoder (`dumpsys gfxinfo <package>`).
//!
//! The report has up to three parts, in order:
//!
//! ```text
//! Total frames rendered: 1200          <- global metrics
//! Janky frames: 50 (4.17%)
//! ...
//! Profile data in ms:
//!     com.example/.../android.view.ViewRootImpl@8f3a2b1 (visibility=0)
//! Total frames rendered: 800           <- metrics for that window
//! ...
//! View hierarchy:
//!   com.example/.../android.view.ViewRootImpl@8f3a2b1
//!   45 views, 52.34 kB of render nodes
//! ```
//!
//! The same metric pattern set is run over the whole text for the global
//! metrics and over each window chunk. Structural entries from the view
//! hierarchy are matched to window chunks by name; an entry with no chunk
//! keeps zeroed metrics.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::{
    FrameMetrics, GfxReport, JankReason, JankReasonKey, Percentiles, ViewStats, ViewTotals,
    WindowReport,
};

use super::{capture, parse_f64_or_zero, parse_u64_or_zero, require_content};
use crate::error::{ExtractError, Result};

pub const PROFILE_DATA_MARKER: &str = "Profile data in ms:";
pub const VIEW_HIERARCHY_MARKER: &str = "View hierarchy:";

static PATTERNS: LazyLock<GfxPatterns> = LazyLock::new(GfxPatterns::new);

struct GfxPatterns {
    total_frames: Regex,
    // Janky frames: 50 (4.17%)
    janky_frames: Regex,
    janky_frames_legacy: Regex,
    cpu_p50: Regex,
    cpu_p90: Regex,
    cpu_p95: Regex,
    cpu_p99: Regex,
    gpu_p50: Regex,
    gpu_p90: Regex,
    gpu_p95: Regex,
    gpu_p99: Regex,
    // Number Slow UI thread: 3
    jank_reasons: Vec<(JankReasonKey, Regex)>,
    // com.example/com.example.MainActivity/android.view.ViewRootImpl@8f3a2b1 (visibility=0)
    window_marker: Regex,
    trailing_parenthetical: Regex,
    // 45 views, 52.34 kB of render nodes
    view_stats: Regex,
    total_view_roots: Regex,
    total_attached_views: Regex,
    // Total RenderNode: 62.34 kB (used) / 1.20 MB (capacity)
    total_render_node: Regex,
}

impl GfxPatterns {
    fn new() -> Self {
        let percentile = |label: &str| {
            Regex::new(&format!(r"(?m)^\s*{label}:\s*([\d.]+)\s*ms")).expect("static regex must compile")
        };
        let jank_reasons = JankReasonKey::ALL
            .into_iter()
            .map(|key| {
                let pattern = format!(r"(?m)^\s*Number {}:\s*(\d+)", regex::escape(key.dump_label()));
                (key, Regex::new(&pattern).expect("static regex must compile"))
            })
            .collect();

        Self {
            total_frames: Regex::new(r"Total frames rendered:\s*(\d+)").expect("static regex must compile"),
            janky_frames: Regex::new(r"Janky frames:\s*(\d+)\s*\(\s*([\d.]+)%\s*\)")
                .expect("static regex must compile"),
            janky_frames_legacy: Regex::new(r"Janky frames \(legacy\):\s*(\d+)")
                .expect("static regex must compile"),
            cpu_p50: percentile("50th percentile"),
            cpu_p90: percentile("90th percentile"),
            cpu_p95: percentile("95th percentile"),
            cpu_p99: percentile("99th percentile"),
            gpu_p50: percentile("50th gpu percentile"),
            gpu_p90: percentile("90th gpu percentile"),
            gpu_p95: percentile("95th gpu percentile"),
            gpu_p99: percentile("99th gpu percentile"),
            jank_reasons,
            window_marker: Regex::new(r"^\s*(\S+@[0-9a-fA-F]+(?:\s+\([^)]*\))?)\s*$")
                .expect("static regex must compile"),
            trailing_parenthetical: Regex::new(r"\s*\([^)]*\)\s*$").expect("static regex must compile"),
            view_stats: Regex::new(r"^\s*(\d+)\s+views,\s+(.+?)\s+of render nodes")
                .expect("static regex must compile"),
            total_view_roots: Regex::new(r"Total ViewRootImpl:\s*(\d+)").expect("static regex must compile"),
            total_attached_views: Regex::new(r"Total attached Views:\s*(\d+)")
                .expect("static regex must compile"),
            total_render_node: Regex::new(
                r"Total RenderNode:\s*(.+?)\s*\(used\)\s*/\s*(.+?)\s*\(capacity\)",
            )
            .expect("static regex must compile"),
        }
    }
}

/// Decodes a graphics report. Never fails; see the module docs.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::parser::gfx::parse_gfxinfo;
///
/// let report = parse_gfxinfo("Total frames rendered: 10\nJanky frames: 1 (10.00%)\n");
/// assert_eq!(report.global.total_frames, 10);
/// assert_eq!(report.global.janky_percent, 10.0);
/// assert!(report.windows.is_empty());
/// ```
pub fn parse_gfxinfo(text: &str) -> GfxReport {
    super::or_default("gfxinfo", try_parse_gfxinfo(text))
}

fn try_parse_gfxinfo(text: &str) -> Result<GfxReport> {
    let text = require_content(text)?;
    let global = extract_frame_metrics(text);

    let profiles = profile_section(text)
        .map(split_window_chunks)
        .unwrap_or_else(|e| {
            debug!(error = %e, "No per-window profile data");
            Vec::new()
        });
    let structures = hierarchy_section(text)
        .map(view_entries)
        .unwrap_or_else(|e| {
            debug!(error = %e, "No view hierarchy");
            Vec::new()
        });

    Ok(GfxReport {
        global,
        windows: correlate_windows(profiles, structures),
        totals: extract_view_totals(text),
    })
}

/// Runs the shared metric pattern set over `text`.
pub fn extract_frame_metrics(text: &str) -> FrameMetrics {
    let p = &*PATTERNS;
    let number = |re: &Regex| capture(re, text, 1).map(parse_f64_or_zero).unwrap_or_default();

    let (janky_frames, janky_percent) = match p.janky_frames.captures(text) {
        Some(caps) => (parse_u64_or_zero(&caps[1]), parse_f64_or_zero(&caps[2])),
        None => (0, 0.0),
    };

    let jank_reasons = p
        .jank_reasons
        .iter()
        .filter_map(|(key, re)| {
            let count = capture(re, text, 1).map(parse_u64_or_zero).unwrap_or_default();
            (count > 0).then(|| JankReason {
                key: *key,
                count,
                label: key.human_label().to_string(),
            })
        })
        .collect();

    FrameMetrics {
        total_frames: capture(&p.total_frames, text, 1)
            .map(parse_u64_or_zero)
            .unwrap_or_default(),
        janky_frames,
        janky_percent,
        janky_frames_legacy: capture(&p.janky_frames_legacy, text, 1).map(parse_u64_or_zero),
        cpu: Percentiles {
            p50: number(&p.cpu_p50),
            p90: number(&p.cpu_p90),
            p95: number(&p.cpu_p95),
            p99: number(&p.cpu_p99),
        },
        gpu: Percentiles {
            p50: number(&p.gpu_p50),
            p90: number(&p.gpu_p90),
            p95: number(&p.gpu_p95),
            p99: number(&p.gpu_p99),
        },
        jank_reasons,
    }
}

fn profile_section(text: &str) -> Result<&str> {
    let start = text
        .find(PROFILE_DATA_MARKER)
        .ok_or(ExtractError::MissingSection(PROFILE_DATA_MARKER))?;
    let body = &text[start + PROFILE_DATA_MARKER.len()..];
    Ok(match body.find(VIEW_HIERARCHY_MARKER) {
        Some(end) => &body[..end],
        None => body,
    })
}

fn hierarchy_section(text: &str) -> Result<&str> {
    let start = text
        .find(VIEW_HIERARCHY_MARKER)
        .ok_or(ExtractError::MissingSection(VIEW_HIERARCHY_MARKER))?;
    Ok(&text[start + VIEW_HIERARCHY_MARKER.len()..])
}

/// A window name and the metrics parsed from its chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowChunk {
    pub name: String,
    pub metrics: FrameMetrics,
}

/// Splits the profile-data section at each window marker line.
pub fn split_window_chunks(section: &str) -> Vec<WindowChunk> {
    let mut chunks: Vec<(String, Vec<&str>)> = Vec::new();
    for line in section.lines() {
        if let Some(name) = capture(&PATTERNS.window_marker, line, 1) {
            chunks.push((name.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = chunks.last_mut() {
            body.push(line);
        }
    }
    chunks
        .into_iter()
        .map(|(name, body)| WindowChunk {
            name,
            metrics: extract_frame_metrics(&body.join("\n")),
        })
        .collect()
}

/// A structural entry from the view hierarchy section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEntry {
    /// The window identifier line, trimmed.
    pub line: String,
    pub stats: ViewStats,
}

/// Finds each window line immediately followed by a `<N> views, <size> of
/// render nodes` line.
pub fn view_entries(section: &str) -> Vec<ViewEntry> {
    let lines: Vec<&str> = section.lines().collect();
    lines
        .windows(2)
        .filter_map(|pair| {
            let name = pair[0].trim();
            if name.is_empty() || PATTERNS.view_stats.is_match(name) {
                return None;
            }
            let caps = PATTERNS.view_stats.captures(pair[1])?;
            Some(ViewEntry {
                line: name.to_string(),
                stats: ViewStats {
                    view_count: parse_u64_or_zero(&caps[1]),
                    render_node_usage: caps[2].trim().to_string(),
                },
            })
        })
        .collect()
}

/// Strips a trailing `(...)` from a window name.
pub fn window_match_key(name: &str) -> &str {
    match PATTERNS.trailing_parenthetical.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Pairs every structural entry with the first profile chunk whose name it
/// contains. Profile chunks no entry claimed are appended without stats.
fn correlate_windows(profiles: Vec<WindowChunk>, entries: Vec<ViewEntry>) -> Vec<WindowReport> {
    let mut claimed = vec![false; profiles.len()];
    let mut windows = Vec::with_capacity(entries.len());

    for entry in entries {
        let matched = profiles.iter().position(|chunk| {
            let key = window_match_key(&chunk.name);
            !key.is_empty() && entry.line.contains(key)
        });
        let metrics = match matched {
            Some(index) => {
                claimed[index] = true;
                profiles[index].metrics.clone()
            }
            None => {
                debug!(window = %entry.line, "No profile data for window");
                FrameMetrics::default()
            }
        };
        windows.push(WindowReport {
            name: entry.line,
            views: Some(entry.stats),
            metrics,
        });
    }

    for (chunk, claimed) in profiles.into_iter().zip(claimed) {
        if !claimed {
            windows.push(WindowReport {
                name: window_match_key(&chunk.name).to_string(),
                views: None,
                metrics: chunk.metrics,
            });
        }
    }

    windows
}

fn extract_view_totals(text: &str) -> ViewTotals {
    let p = &*PATTERNS;
    let (render_node_used, render_node_capacity) = match p.total_render_node.captures(text) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (String::new(), String::new()),
    };
    ViewTotals {
        view_roots: capture(&p.total_view_roots, text, 1)
            .map(parse_u64_or_zero)
            .unwrap_or_default(),
        attached_views: capture(&p.total_attached_views, text, 1)
            .map(parse_u64_or_zero)
            .unwrap_or_default(),
        render_node_used,
        render_node_capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_BODY: &str = "\
Stats since: 52018382ns
Total frames rendered: 800
Janky frames: 20 (2.50%)
50th percentile: 6ms
90th percentile: 11ms
95th percentile: 16ms
99th percentile: 32ms
Number Missed Vsync: 0
Number Slow UI thread: 3
50th gpu percentile: 2ms
90th gpu percentile: 4ms
95th gpu percentile: 5ms
99th gpu percentile: 9ms
";

    #[test]
    fn test_frame_metrics_fields() {
        let metrics = extract_frame_metrics(WINDOW_BODY);
        assert_eq!(metrics.total_frames, 800);
        assert_eq!(metrics.janky_frames, 20);
        assert_eq!(metrics.janky_percent, 2.5);
        assert_eq!(metrics.janky_frames_legacy, None);
        assert_eq!(metrics.cpu, Percentiles { p50: 6.0, p90: 11.0, p95: 16.0, p99: 32.0 });
        assert_eq!(metrics.gpu, Percentiles { p50: 2.0, p90: 4.0, p95: 5.0, p99: 9.0 });
    }

    #[test]
    fn test_zero_count_reasons_are_omitted() {
        let metrics = extract_frame_metrics(WINDOW_BODY);
        assert!(metrics.reason(JankReasonKey::MissedVsync).is_none());
        assert_eq!(metrics.jank_reasons.len(), 1);
        assert_eq!(metrics.jank_reasons[0].key, JankReasonKey::SlowUiThread);
        assert_eq!(metrics.jank_reasons[0].count, 3);
        assert_eq!(metrics.jank_reasons[0].label, "Slow UI thread");
    }

    #[test]
    fn test_deadline_counter_ignores_legacy_line() {
        let metrics = extract_frame_metrics(
            "Number Frame deadline missed (legacy): 9\nNumber Frame deadline missed: 4\n",
        );
        assert_eq!(metrics.reason(JankReasonKey::FrameDeadlineMissed).unwrap().count, 4);
        assert_eq!(
            metrics.reason(JankReasonKey::FrameDeadlineMissedLegacy).unwrap().count,
            9
        );
    }

    #[test]
    fn test_unparseable_numbers_default_to_zero() {
        let metrics = extract_frame_metrics("Total frames rendered: many\n50th percentile: ?ms\n");
        assert_eq!(metrics.total_frames, 0);
        assert_eq!(metrics.cpu.p50, 0.0);
    }

    #[test]
    fn test_window_match_key_strips_parenthetical() {
        assert_eq!(window_match_key("a/b/ViewRootImpl@1f (visibility=0)"), "a/b/ViewRootImpl@1f");
        assert_eq!(window_match_key("a/b/ViewRootImpl@1f"), "a/b/ViewRootImpl@1f");
    }

    #[test]
    fn test_split_window_chunks() {
        let section = format!(
            "\n\tcom.x/com.x.Main/android.view.ViewRootImpl@8f3a2b1 (visibility=0)\n{WINDOW_BODY}\n\
             \tcom.x/com.x.Dialog/android.view.ViewRootImpl@1c2d3e (visibility=8)\nTotal frames rendered: 5\n"
        );
        let chunks = split_window_chunks(&section);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name, "com.x/com.x.Main/android.view.ViewRootImpl@8f3a2b1 (visibility=0)");
        assert_eq!(chunks[0].metrics.total_frames, 800);
        assert_eq!(chunks[1].metrics.total_frames, 5);
    }

    #[test]
    fn test_view_entries_require_adjacent_stats_line() {
        let section = "\n  com.x/A/android.view.ViewRootImpl@1\n  45 views, 52.34 kB of render nodes\n\n  \
                       com.x/B/android.view.ViewRootImpl@2\n\n  3 views, 1.00 kB of render nodes\n";
        let entries = view_entries(section);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].line, "com.x/A/android.view.ViewRootImpl@1");
        assert_eq!(entries[0].stats.view_count, 45);
        assert_eq!(entries[0].stats.render_node_usage, "52.34 kB");
    }

    #[test]
    fn test_unmatched_entry_keeps_default_metrics() {
        let profiles = vec![WindowChunk {
            name: "com.x/A/android.view.ViewRootImpl@1 (visibility=0)".into(),
            metrics: extract_frame_metrics(WINDOW_BODY),
        }];
        let entries = vec![
            ViewEntry {
                line: "com.x/A/android.view.ViewRootImpl@1".into(),
                stats: ViewStats::default(),
            },
            ViewEntry {
                line: "com.x/B/android.view.ViewRootImpl@2".into(),
                stats: ViewStats::default(),
            },
        ];
        let windows = correlate_windows(profiles, entries);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].metrics.total_frames, 800);
        assert_eq!(windows[1].metrics, FrameMetrics::default());
        assert!(windows[1].views.is_some());
    }

    #[test]
    fn test_unclaimed_profile_is_kept_without_stats() {
        let profiles = vec![WindowChunk {
            name: "com.x/Z/android.view.ViewRootImpl@9 (visibility=0)".into(),
            metrics: FrameMetrics::default(),
        }];
        let windows = correlate_windows(profiles, Vec::new());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].name, "com.x/Z/android.view.ViewRootImpl@9");
        assert!(windows[0].views.is_none());
    }

    #[test]
    fn test_missing_sections_degrade_to_global_only() {
        let report = parse_gfxinfo(WINDOW_BODY);
        assert_eq!(report.global.total_frames, 800);
        assert!(report.windows.is_empty());
        assert_eq!(report.totals, ViewTotals::default());
    }

    #[test]
    fn test_empty_input_is_default() {
        assert_eq!(parse_gfxinfo(""), GfxReport::default());
    }
}
