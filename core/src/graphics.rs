//! Frame-rendering metrics from a graphics performance dump.

use serde::{Deserialize, Serialize};

/// Named counters explaining why frames were janky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JankReasonKey {
    MissedVsync,
    HighInputLatency,
    SlowUiThread,
    SlowBitmapUploads,
    SlowIssueDrawCommands,
    FrameDeadlineMissed,
    FrameDeadlineMissedLegacy,
}

impl JankReasonKey {
    /// All counters, in the order they are reported.
    pub const ALL: [JankReasonKey; 7] = [
        Self::MissedVsync,
        Self::HighInputLatency,
        Self::SlowUiThread,
        Self::SlowBitmapUploads,
        Self::SlowIssueDrawCommands,
        Self::FrameDeadlineMissed,
        Self::FrameDeadlineMissedLegacy,
    ];

    /// The exact label that follows `Number ` in the dump.
    pub fn dump_label(self) -> &'static str {
        match self {
            Self::MissedVsync => "Missed Vsync",
            Self::HighInputLatency => "High input latency",
            Self::SlowUiThread => "Slow UI thread",
            Self::SlowBitmapUploads => "Slow bitmap uploads",
            Self::SlowIssueDrawCommands => "Slow issue draw commands",
            Self::FrameDeadlineMissed => "Frame deadline missed",
            Self::FrameDeadlineMissedLegacy => "Frame deadline missed (legacy)",
        }
    }

    /// Human-readable description for display.
    pub fn human_label(self) -> &'static str {
        match self {
            Self::MissedVsync => "Missed vsync",
            Self::HighInputLatency => "High input latency",
            Self::SlowUiThread => "Slow UI thread",
            Self::SlowBitmapUploads => "Slow bitmap uploads",
            Self::SlowIssueDrawCommands => "Slow draw command issue",
            Self::FrameDeadlineMissed => "Frame deadline missed",
            Self::FrameDeadlineMissedLegacy => "Frame deadline missed (legacy)",
        }
    }
}

/// A nonzero jank counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JankReason {
    pub key: JankReasonKey,
    pub count: u64,
    pub label: String,
}

/// CPU or GPU frame-time percentiles in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Frame metrics for the whole report or a single window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub total_frames: u64,
    pub janky_frames: u64,
    pub janky_percent: f64,
    /// `Janky frames (legacy):` counter, when the device prints it.
    pub janky_frames_legacy: Option<u64>,
    pub cpu: Percentiles,
    pub gpu: Percentiles,
    /// Only counters whose value is greater than zero.
    pub jank_reasons: Vec<JankReason>,
}

impl FrameMetrics {
    pub fn reason(&self, key: JankReasonKey) -> Option<&JankReason> {
        self.jank_reasons.iter().find(|r| r.key == key)
    }
}

/// Structural stats for one window from the `View hierarchy:` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewStats {
    pub view_count: u64,
    /// Render-node memory as printed, e.g. `52.34 kB`.
    pub render_node_usage: String,
}

/// One rendering window with its metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowReport {
    /// Window identifier, e.g. `com.example/com.example.MainActivity/android.view.ViewRootImpl@8f3a2b1`.
    pub name: String,
    /// `None` for a profiled window with no structural entry.
    pub views: Option<ViewStats>,
    /// Zeroed when no profile chunk matches the window.
    pub metrics: FrameMetrics,
}

/// Totals printed at the end of the view hierarchy section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewTotals {
    pub view_roots: u64,
    pub attached_views: u64,
    pub render_node_used: String,
    pub render_node_capacity: String,
}

/// A decoded graphics report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GfxReport {
    pub global: FrameMetrics,
    pub windows: Vec<WindowReport>,
    pub totals: ViewTotals,
}

impl GfxReport {
    pub fn window(&self, name_fragment: &str) -> Option<&WindowReport> {
        self.windows.iter().find(|w| w.name.contains(name_fragment))
    }
}
