//! Extract typed reports from Android diagnostic shell dumps.
//!
//! This crate turns the text printed by `getprop`, `ps -T`,
//! `dumpsys activity top`, `dumpsys gfxinfo` and `dumpsys cpuinfo` into the
//! structured types of [`dumpscope_core`]. Every extractor is a pure function
//! of its input text and never fails: missing sections and malformed rows
//! degrade to defaults (see [`parser`]).
//!
//! # Main entry points
//!
//! - [`parse_report`]: parse captured text of a given [`ReportKind`].
//! - [`snapshot::capture_snapshot`]: run every dump through a
//!   [`device::CommandRunner`] and assemble a [`DeviceSnapshot`].
//! - [`parser`]: the individual extractors.
//!
//! # Example
//!
//! ```
//! use dumpscope_extract::{ExtractOptions, Report, ReportKind, parse_report};
//!
//! let text = "\
//! Load: 1.25 / 0.8 / 0.4
//! CPU usage from 6000ms to 1000ms ago (10:00:00.000 to 10:00:05.000):
//!   12% 4521/com.example: 10% user + 2% kernel
//! 30% TOTAL: 20% user + 10% kernel
//! ";
//!
//! let report = parse_report(ReportKind::Cpu, text, Some("com.example"), &ExtractOptions::default());
//! let Report::Cpu(cpu) = report else { unreachable!() };
//! assert_eq!(cpu.time_range.duration_ms, 5000);
//! assert_eq!(cpu.target.unwrap().pid, 4521);
//! ```
//!
//! [`DeviceSnapshot`]: dumpscope_core::DeviceSnapshot

pub mod config;
pub mod device;
pub mod error;
pub mod output;
pub mod parser;
pub mod snapshot;

use serde::Serialize;

use dumpscope_core::{ActivityRecord, CpuSnapshot, GfxReport, ProcessTable, PropertyMap};
use parser::activity::ActivityOptions;
use parser::table::TableOptions;

/// The kinds of report the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ReportKind {
    /// `getprop`
    Props,
    /// `ps -T -p <pid>`
    Threads,
    /// `dumpsys activity top`
    Activities,
    /// `dumpsys gfxinfo <package>`
    Gfx,
    /// `dumpsys cpuinfo`
    Cpu,
}

/// Knobs for the extractors that have more than one behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub table: TableOptions,
    pub activity: ActivityOptions,
}

/// A parsed report of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Props(PropertyMap),
    Threads(ProcessTable),
    Activities(Vec<ActivityRecord>),
    Gfx(GfxReport),
    Cpu(CpuSnapshot),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::Props(_) => ReportKind::Props,
            Self::Threads(_) => ReportKind::Threads,
            Self::Activities(_) => ReportKind::Activities,
            Self::Gfx(_) => ReportKind::Gfx,
            Self::Cpu(_) => ReportKind::Cpu,
        }
    }
}

/// Parses captured dump text of the given kind.
///
/// `target` is only used by [`ReportKind::Cpu`], where it selects the
/// distinguished target process.
pub fn parse_report(
    kind: ReportKind,
    text: &str,
    target: Option<&str>,
    options: &ExtractOptions,
) -> Report {
    match kind {
        ReportKind::Props => Report::Props(parser::props::parse_properties(text)),
        ReportKind::Threads => {
            Report::Threads(parser::table::parse_process_table(text, &options.table))
        }
        ReportKind::Activities => {
            Report::Activities(parser::activity::parse_activities(text, &options.activity))
        }
        ReportKind::Gfx => Report::Gfx(parser::gfx::parse_gfxinfo(text)),
        ReportKind::Cpu => Report::Cpu(parser::cpu::parse_cpuinfo(text, target)),
    }
}
