//! CPU accounting dump decoder (`dumpsys cpuinfo`).
//!
//! ```text
//! Load: 10.05 / 10.1 / 7.69
//! CPU usage from 18992ms to 8032ms ago (2026-01-09 17:46:00.000 to 2026-01-09 17:46:10.960):
//!   140% 4521/com.mico: 110% user + 30% kernel / faults: 19894 minor
//! 62% TOTAL: 36% user + 21% kernel + 0% iowait + 3.2% irq + 1.3% softirq
//! ```
//!
//! Process lines are read from the line after the time range up to the
//! `TOTAL:` line, which ends the scan.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::{CpuSnapshot, LoadInfo, ProcessCpuInfo, SystemCpuInfo, TimeRange};

use super::{ScanState, capture, parse_f64_or_zero, parse_i64_or_zero, parse_u64_or_zero, require_content};
use crate::error::{ExtractError, Result};

pub const LOAD_MARKER: &str = "Load:";
pub const TIME_RANGE_MARKER: &str = "CPU usage from";
pub const TOTAL_MARKER: &str = "TOTAL:";

static PATTERNS: LazyLock<CpuPatterns> = LazyLock::new(CpuPatterns::new);

struct CpuPatterns {
    // from 18992ms to 8032ms ago
    offsets: Regex,
    // (2026-01-09 17:46:00.000 to 2026-01-09 17:46:10.960)
    timestamps: Regex,
    // 140% 4521/com.mico: 110% user + 30% kernel / faults: 19894 minor 2 major
    process: Regex,
    // 62% TOTAL: 36% user + 21% kernel + 0% iowait + 3.2% irq + 1.3% softirq
    total: Regex,
    total_iowait: Regex,
    total_irq: Regex,
    total_softirq: Regex,
}

impl CpuPatterns {
    fn new() -> Self {
        Self {
            offsets: Regex::new(r"from\s+(-?\d+)ms\s+to\s+(-?\d+)ms\s+ago").expect("static regex must compile"),
            timestamps: Regex::new(r"\(([^)]+?)\s+to\s+([^)]+?)\)").expect("static regex must compile"),
            process: Regex::new(
                r"^\s*(-?[\d.]+)%\s+(\d+)/(.+?):\s+(-?[\d.]+)%\s+user\s+\+\s+(-?[\d.]+)%\s+kernel(?:.*?/\s*faults:(?:\s+(\d+)\s+minor)?(?:\s+(\d+)\s+major)?)?",
            )
            .expect("static regex must compile"),
            total: Regex::new(r"(-?[\d.]+)%\s+TOTAL:\s+(-?[\d.]+)%\s+user\s+\+\s+(-?[\d.]+)%\s+kernel")
                .expect("static regex must compile"),
            total_iowait: Regex::new(r"\+\s+(-?[\d.]+)%\s+iowait").expect("static regex must compile"),
            total_irq: Regex::new(r"\+\s+(-?[\d.]+)%\s+irq").expect("static regex must compile"),
            total_softirq: Regex::new(r"\+\s+(-?[\d.]+)%\s+softirq").expect("static regex must compile"),
        }
    }
}

/// Decodes a CPU report. When `target` is given, the first process whose
/// name contains it is also returned as [`CpuSnapshot::target`].
///
/// # Examples
///
/// ```
/// use dumpscope_extract::parser::cpu::parse_cpuinfo;
///
/// let text = "Load: 1.5 / 1.0 / 0.5\n";
/// let snapshot = parse_cpuinfo(text, None);
/// assert_eq!(snapshot.load.one_minute, 1.5);
/// assert!(snapshot.processes.is_empty());
/// ```
pub fn parse_cpuinfo(text: &str, target: Option<&str>) -> CpuSnapshot {
    super::or_default("cpuinfo", try_parse_cpuinfo(text, target))
}

fn try_parse_cpuinfo(text: &str, target: Option<&str>) -> Result<CpuSnapshot> {
    let text = require_content(text)?;
    let lines: Vec<&str> = text.lines().collect();

    let load = parse_load(&lines).unwrap_or_else(|e| {
        debug!(error = %e, "Load averages unavailable");
        LoadInfo::default()
    });

    let range_index = lines.iter().position(|line| line.contains(TIME_RANGE_MARKER));
    let time_range = match range_index {
        Some(index) => parse_time_range(lines[index]).unwrap_or_else(|e| {
            debug!(error = %e, "Time range unavailable");
            TimeRange::default()
        }),
        None => TimeRange::default(),
    };

    let scan = match range_index {
        Some(index) => scan_processes(&lines[index + 1..]),
        // Rows are only trusted below the sampling window header.
        None => {
            debug!("No time range line, skipping process scan");
            ProcessScan::default()
        }
    };

    let target = target.and_then(|name| {
        scan.processes
            .iter()
            .find(|process| process.process_name.contains(name))
            .cloned()
    });

    Ok(CpuSnapshot {
        load,
        time_range,
        processes: scan.processes,
        target,
        system: scan.system,
    })
}

/// Reads the first `Load:` line as three `/`-separated floats.
pub fn parse_load(lines: &[&str]) -> Result<LoadInfo> {
    let line = lines
        .iter()
        .map(|line| line.trim())
        .find(|line| line.starts_with(LOAD_MARKER))
        .ok_or(ExtractError::MissingSection(LOAD_MARKER))?;
    let values = line[LOAD_MARKER.len()..]
        .split('/')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|_| malformed("load", line))?;
    let &[one_minute, five_minutes, fifteen_minutes] = values.as_slice() else {
        return Err(malformed("load", line));
    };
    Ok(LoadInfo {
        one_minute,
        five_minutes,
        fifteen_minutes,
    })
}

/// Parses the `CPU usage from ...` line. Duration is the first offset minus
/// the second, or zero when that difference does not fit in an `i64`.
pub fn parse_time_range(line: &str) -> Result<TimeRange> {
    let p = &*PATTERNS;
    let offsets = p.offsets.captures(line).ok_or_else(|| malformed("time range", line))?;
    let stamps = p.timestamps.captures(line).ok_or_else(|| malformed("time range", line))?;
    Ok(TimeRange {
        start: stamps[1].trim().to_string(),
        end: stamps[2].trim().to_string(),
        duration_ms: parse_i64_or_zero(&offsets[1])
            .checked_sub(parse_i64_or_zero(&offsets[2]))
            .unwrap_or(0),
    })
}

/// Process rows and the aggregate line collected by [`scan_processes`].
#[derive(Debug, Default)]
pub struct ProcessScan {
    pub processes: Vec<ProcessCpuInfo>,
    pub system: SystemCpuInfo,
    /// `Scanning` when no scan ran, `Collecting` when input ended before a
    /// `TOTAL:` line, `Closed` once one was found.
    pub state: ScanState,
}

/// Collects process rows until the `TOTAL:` line, which is parsed into the
/// aggregate and closes the scan. Lines after it are ignored.
pub fn scan_processes(lines: &[&str]) -> ProcessScan {
    let mut scan = ProcessScan {
        state: ScanState::Collecting,
        ..ProcessScan::default()
    };
    let mut skipped = 0usize;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.contains(TOTAL_MARKER) {
            scan.system = parse_total(line);
            scan.state = ScanState::Closed;
            break;
        }
        match parse_process_line(line) {
            Some(process) => scan.processes.push(process),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, parsed = scan.processes.len(), "Skipped unrecognized CPU lines");
    }
    scan
}

/// Parses one process row, or `None` if it does not match.
pub fn parse_process_line(line: &str) -> Option<ProcessCpuInfo> {
    let caps = PATTERNS.process.captures(line)?;
    let count = |group: usize| caps.get(group).map(|m| parse_u64_or_zero(m.as_str())).unwrap_or(0);
    Some(ProcessCpuInfo {
        total_percent: parse_f64_or_zero(&caps[1]),
        pid: caps[2].parse().unwrap_or(0),
        process_name: caps[3].to_string(),
        user_percent: parse_f64_or_zero(&caps[4]),
        kernel_percent: parse_f64_or_zero(&caps[5]),
        minor_faults: count(6),
        major_faults: count(7),
    })
}

/// Parses the `TOTAL:` aggregate. Absent components are zero.
pub fn parse_total(line: &str) -> SystemCpuInfo {
    let p = &*PATTERNS;
    let Some(caps) = p.total.captures(line) else {
        debug!(line, "Unrecognized TOTAL line");
        return SystemCpuInfo::default();
    };
    let component = |re: &Regex| capture(re, line, 1).map(parse_f64_or_zero).unwrap_or(0.0);
    SystemCpuInfo {
        total_percent: parse_f64_or_zero(&caps[1]),
        user_percent: parse_f64_or_zero(&caps[2]),
        kernel_percent: parse_f64_or_zero(&caps[3]),
        iowait_percent: component(&p.total_iowait),
        irq_percent: component(&p.total_irq),
        softirq_percent: component(&p.total_softirq),
    }
}

fn malformed(field: &'static str, line: &str) -> ExtractError {
    ExtractError::Malformed {
        field,
        line: line.to_string(),
    }
}
