//! Fixed-column process/thread listing decoder.
//!
//! Input is `ps -T` style output: the first non-blank line is the header and
//! every following line is one row of ten whitespace-separated columns
//!
//! ```text
//! USER  PID  TID  PPID  VSZ  RSS  WCHAN  ADDR  S  CMD
//! ```
//!
//! The final `CMD` column may itself contain spaces, so a row is split into at
//! most ten fields and the last one keeps the remainder verbatim.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::{ProcessSummary, ProcessTable, RowKind, TabularRecord, ThreadState};

use super::require_content;
use crate::error::Result;

/// Number of columns in a full row.
pub const COLUMN_COUNT: usize = 10;

static PATTERNS: LazyLock<TablePatterns> = LazyLock::new(TablePatterns::new);

struct TablePatterns {
    column_break: Regex,
}

impl TablePatterns {
    fn new() -> Self {
        Self {
            column_break: Regex::new(r"\s+").expect("static regex must compile"),
        }
    }
}

/// What to do with a row that has fewer than [`COLUMN_COUNT`] columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Drop short rows; the header is not kept either.
    #[default]
    Drop,
    /// Keep the header as the first record and turn short rows into
    /// [`RowKind::Degraded`] records, so the output has one record per
    /// non-blank input line.
    Degrade,
}

/// Options for [`parse_process_table`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    pub policy: RowPolicy,
}

/// Decodes a process/thread listing.
///
/// Rows whose state is `R` are moved ahead of all other rows; the order
/// within each group is the input order. A retained header is never sorted
/// and always comes first.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::parser::table::{parse_process_table, TableOptions};
///
/// let text = "\
/// USER      PID   TID  PPID    VSZ   RSS WCHAN     ADDR S CMD
/// u0_a1    4521  4521   612 158491 20162 do_epoll     0 S com.example
/// u0_a1    4521  4533   612 158491 20162 0            0 R RenderThread
/// ";
/// let table = parse_process_table(text, &TableOptions::default());
/// assert_eq!(table.records.len(), 2);
/// assert_eq!(table.records[0].command, "RenderThread");
/// assert_eq!(table.process.unwrap().pid, "4521");
/// ```
pub fn parse_process_table(text: &str, options: &TableOptions) -> ProcessTable {
    super::or_default("process-table", try_parse_process_table(text, options))
}

fn try_parse_process_table(text: &str, options: &TableOptions) -> Result<ProcessTable> {
    let text = require_content(text)?;
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Ok(ProcessTable::default());
    };

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for line in lines {
        match split_row(line) {
            Some(record) => records.push(record),
            None => match options.policy {
                RowPolicy::Drop => dropped += 1,
                RowPolicy::Degrade => records.push(TabularRecord::degraded(line)),
            },
        }
    }
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "Dropped short process rows");
    }

    let process = records
        .iter()
        .find(|r| r.kind == RowKind::Data)
        .map(|first| ProcessSummary {
            owner: first.owner.clone(),
            pid: first.process_id.clone(),
            ppid: first.parent_process_id.clone(),
            virtual_mem_kb: first.virtual_mem_kb.clone(),
            resident_mem_kb: first.resident_mem_kb.clone(),
        });

    sort_running_first(&mut records);

    if options.policy == RowPolicy::Degrade {
        let mut header = split_row(header_line).unwrap_or_else(|| TabularRecord::degraded(header_line));
        header.kind = RowKind::Header;
        header.state = ThreadState::Unknown;
        records.insert(0, header);
    }

    Ok(ProcessTable { process, records })
}

/// Splits one row into a record, or `None` if it is short.
fn split_row(line: &str) -> Option<TabularRecord> {
    let fields: Vec<&str> = PATTERNS
        .column_break
        .splitn(line.trim(), COLUMN_COUNT)
        .collect();
    let [owner, pid, tid, ppid, vsz, rss, wchan, addr, state, command] = fields.as_slice() else {
        return None;
    };
    Some(TabularRecord {
        kind: RowKind::Data,
        owner: owner.to_string(),
        process_id: pid.to_string(),
        thread_id: tid.to_string(),
        parent_process_id: ppid.to_string(),
        virtual_mem_kb: vsz.to_string(),
        resident_mem_kb: rss.to_string(),
        wait_channel: wchan.to_string(),
        program_counter: addr.to_string(),
        state: ThreadState::from_code(state),
        command: command.to_string(),
    })
}

/// Stable partition: running rows first, input order kept within each group.
fn sort_running_first(records: &mut [TabularRecord]) {
    records.sort_by_key(|record| !record.state.is_running());
}
