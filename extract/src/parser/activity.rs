//! Multi-activity dump decoder (`dumpsys activity top`).
//!
//! Works in three stages per activity:
//!
//! 1. Segmentation: lines are left-trimmed and split at each line starting
//!    with `ACTIVITY`. The preamble before the first marker is dropped. In
//!    each block the `Choreographer` section is cut away, keeping anything
//!    from a later `ResourcesManager` line onward.
//! 2. Header fields: package, activity and pid from the first few lines, and
//!    the `mResumed=`/`mStopped=`/`mFinished=` flags from anywhere in the block.
//! 3. Fragments: see [`fragment`](super::fragment).

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::ActivityRecord;

use super::fragment::{FragmentGrouping, extract_fragments};
use super::{capture, parse_bool_or, require_content};
use crate::error::Result;

/// Line prefix that opens an activity block.
pub const ACTIVITY_MARKER: &str = "ACTIVITY";
/// Line prefix of the section cut from each block.
pub const CHOREOGRAPHER_MARKER: &str = "Choreographer";
/// Line prefix of the section reattached after the cut.
pub const RESOURCES_MANAGER_MARKER: &str = "ResourcesManager";
/// How many leading lines of a block are searched for header fields.
pub const HEADER_LINES: usize = 5;

static PATTERNS: LazyLock<ActivityPatterns> = LazyLock::new(ActivityPatterns::new);

struct ActivityPatterns {
    // ACTIVITY com.example/.MainActivity 3c1f2a pid=4521
    component: Regex,
    pid: Regex,
    resumed: Regex,
    stopped: Regex,
    finished: Regex,
}

impl ActivityPatterns {
    fn new() -> Self {
        Self {
            component: Regex::new(r"ACTIVITY\s+([^\s/]+)/(\S+)").expect("static regex must compile"),
            pid: Regex::new(r"\bpid=(\d+)").expect("static regex must compile"),
            resumed: Regex::new(r"\bmResumed=(true|false)").expect("static regex must compile"),
            stopped: Regex::new(r"\bmStopped=(true|false)").expect("static regex must compile"),
            finished: Regex::new(r"\bmFinished=(true|false)").expect("static regex must compile"),
        }
    }
}

/// Options for [`parse_activities`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityOptions {
    pub grouping: FragmentGrouping,
}

/// Decodes every activity block of a dump.
///
/// A block whose header cannot be matched still yields a record with empty
/// package, activity and pid.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::parser::activity::{parse_activities, ActivityOptions};
///
/// let dump = "\
/// TASK 12 id=88 userId=0
///   ACTIVITY com.example/.MainActivity 3c1f2a pid=4521
///     Local Activity 8b4e1d State:
///       mResumed=true mStopped=false mFinished=false
/// ";
/// let activities = parse_activities(dump, &ActivityOptions::default());
/// assert_eq!(activities.len(), 1);
/// assert_eq!(activities[0].package, "com.example");
/// assert_eq!(activities[0].pid, "4521");
/// assert!(activities[0].resumed);
/// ```
pub fn parse_activities(text: &str, options: &ActivityOptions) -> Vec<ActivityRecord> {
    super::or_default("activities", try_parse_activities(text, options))
}

fn try_parse_activities(text: &str, options: &ActivityOptions) -> Result<Vec<ActivityRecord>> {
    let text = require_content(text)?;
    let blocks = split_activity_blocks(text);
    debug!(blocks = blocks.len(), "Segmented activity dump");
    Ok(blocks
        .iter()
        .map(|block| parse_activity_block(block, options))
        .collect())
}

/// Stage 1: splits a dump into trimmed activity blocks.
pub fn split_activity_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in text.lines().map(str::trim_start) {
        if line.starts_with(ACTIVITY_MARKER) {
            blocks.push(vec![line]);
        } else if let Some(current) = blocks.last_mut() {
            current.push(line);
        }
    }
    blocks.into_iter().map(trim_block).collect()
}

/// Removes the `Choreographer` section, reattaching the `ResourcesManager`
/// section if one follows it.
fn trim_block(lines: Vec<&str>) -> Vec<&str> {
    let Some(cut) = lines
        .iter()
        .position(|line| line.starts_with(CHOREOGRAPHER_MARKER))
    else {
        return lines;
    };
    let resumes = lines[cut..]
        .iter()
        .position(|line| line.starts_with(RESOURCES_MANAGER_MARKER))
        .map(|offset| cut + offset);

    let mut kept = lines[..cut].to_vec();
    if let Some(resume) = resumes {
        kept.extend_from_slice(&lines[resume..]);
    }
    kept
}

/// Stages 2 and 3 for a single block.
pub fn parse_activity_block(lines: &[&str], options: &ActivityOptions) -> ActivityRecord {
    let p = &*PATTERNS;
    let header = lines
        .iter()
        .take(HEADER_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let body = lines.join("\n");

    let (package, activity) = match p.component.captures(&header) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => {
            debug!(first_line = lines.first().copied().unwrap_or_default(), "Activity header not recognized");
            (String::new(), String::new())
        }
    };

    ActivityRecord {
        package,
        activity,
        pid: capture(&p.pid, &header, 1).unwrap_or_default().to_string(),
        resumed: parse_bool_or(capture(&p.resumed, &body, 1), false),
        stopped: parse_bool_or(capture(&p.stopped, &body, 1), false),
        finished: parse_bool_or(capture(&p.finished, &body, 1), false),
        fragments: extract_fragments(lines, options.grouping),
    }
}
