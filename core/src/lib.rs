//! Typed data model for Android diagnostic shell reports.
//!
//! This crate defines the structured results produced by the extraction
//! engine in `dumpscope-extract`:
//!
//! - [`PropertyMap`]: decoded `getprop` output.
//! - [`ProcessTable`] / [`TabularRecord`]: a `ps -T` listing.
//! - [`ActivityRecord`] / [`FragmentRecord`]: activities with their
//!   reconstructed Fragment trees.
//! - [`GfxReport`] / [`FrameMetrics`]: global and per-window frame metrics.
//! - [`CpuSnapshot`]: load averages, per-process CPU and the system total.
//! - [`DeviceSnapshot`]: all of the above captured together.
//!
//! [`RollingHistory`] is a bounded FIFO for callers that poll repeatedly.
//!
//! # Example
//!
//! ```
//! use dumpscope_core::*;
//!
//! let record = ActivityRecord {
//!     package: "com.example".into(),
//!     activity: ".MainActivity".into(),
//!     resumed: true,
//!     ..ActivityRecord::default()
//! };
//! assert_eq!(record.display_state(), ActivityState::Resumed);
//! assert_eq!(record.fragment_count(), 0);
//! ```

mod activity;
mod graphics;
mod history;
mod snapshot;
mod types;

pub use activity::{ActivityRecord, ActivityState, FragmentRecord, LifecycleState};
pub use graphics::{
    FrameMetrics, GfxReport, JankReason, JankReasonKey, Percentiles, ViewStats, ViewTotals,
    WindowReport,
};
pub use history::RollingHistory;
pub use snapshot::{DeviceInfo, DeviceSnapshot};
pub use types::*;
