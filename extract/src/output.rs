//! Output formatting for reports and snapshots.

use std::fmt::Write as _;

use dumpscope_core::{
    ActivityRecord, ActivityState, CpuSnapshot, DeviceSnapshot, FragmentRecord, FrameMetrics,
    GfxReport, ProcessTable, PropertyMap, RowKind,
};

use crate::Report;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

/// Formats a single report in the requested output format.
pub fn format_report(report: &Report, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Table => Ok(report_to_table(report)),
    }
}

/// Formats a full device snapshot in the requested output format.
pub fn format_snapshot(snapshot: &DeviceSnapshot, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(snapshot).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Table => Ok(snapshot_to_table(snapshot)),
    }
}

fn report_to_table(report: &Report) -> String {
    match report {
        Report::Props(props) => props_to_table(props),
        Report::Threads(table) => threads_to_table(table),
        Report::Activities(activities) => activities_to_table(activities),
        Report::Gfx(gfx) => gfx_to_table(gfx),
        Report::Cpu(cpu) => cpu_to_table(cpu),
    }
}

fn snapshot_to_table(snapshot: &DeviceSnapshot) -> String {
    let mut out = String::new();
    let device = &snapshot.device;
    let _ = writeln!(
        out,
        "Device: {} {}  Android {} (SDK {})  {}",
        device.brand, device.model, device.release, device.sdk, device.abi
    );
    let _ = writeln!(out, "Captured: {}", snapshot.captured_at.to_rfc3339());
    if let Some(ref target) = snapshot.target {
        let _ = writeln!(out, "Target: {target}");
    }

    for (title, body) in [
        ("Activities", activities_to_table(&snapshot.activities)),
        ("Graphics", gfx_to_table(&snapshot.graphics)),
        ("CPU", cpu_to_table(&snapshot.cpu)),
        ("Threads", threads_to_table(&snapshot.threads)),
    ] {
        let _ = write!(out, "\n== {title} ==\n{body}");
    }
    out
}

fn props_to_table(props: &PropertyMap) -> String {
    if props.is_empty() {
        return "No properties.\n".to_string();
    }
    let width = props.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in props.iter() {
        let _ = writeln!(out, "{key:<width$}  {value}");
    }
    out
}

fn threads_to_table(table: &ProcessTable) -> String {
    let mut out = String::new();
    if let Some(ref process) = table.process {
        let _ = writeln!(
            out,
            "Process {} (ppid {}, user {})  VSZ {} kB  RSS {} kB",
            process.pid, process.ppid, process.owner, process.virtual_mem_kb, process.resident_mem_kb
        );
    }
    let rows: Vec<_> = table.rows().collect();
    if rows.is_empty() {
        out.push_str("No threads.\n");
        return out;
    }
    let _ = writeln!(
        out,
        "{} threads, {} running",
        rows.len(),
        table.running_count()
    );
    let _ = writeln!(out, "  {:>7}  {:<9}  {:<18}  COMMAND", "TID", "STATE", "WCHAN");
    for row in rows {
        if row.kind == RowKind::Degraded {
            let _ = writeln!(out, "  {:>7}  {:<9}  {:<18}  {}", "?", "?", "", row.command);
            continue;
        }
        let _ = writeln!(
            out,
            "  {:>7}  {:<9}  {:<18}  {}",
            row.thread_id,
            row.state.label(),
            row.wait_channel,
            row.command
        );
    }
    out
}

fn activities_to_table(activities: &[ActivityRecord]) -> String {
    if activities.is_empty() {
        return "No activities.\n".to_string();
    }
    let mut out = String::new();
    for activity in activities {
        let state = match activity.display_state() {
            ActivityState::Resumed => "resumed",
            ActivityState::Stopped => "stopped",
            ActivityState::Finished => "finished",
            ActivityState::Other => "-",
        };
        let _ = writeln!(
            out,
            "{}  pid {}  [{state}]  {} fragments",
            activity.qualified_activity(),
            if activity.pid.is_empty() { "?" } else { &activity.pid },
            activity.fragment_count()
        );
        for fragment in &activity.fragments {
            write_fragment(&mut out, fragment, 1);
        }
    }
    out
}

fn write_fragment(out: &mut String, fragment: &FragmentRecord, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}{} {}", fragment.instance, fragment.state.label());
    if let Some(ref tag) = fragment.tag {
        let _ = write!(out, " tag={tag}");
    }
    if fragment.hidden {
        out.push_str(" hidden");
    }
    out.push('\n');
    for child in &fragment.children {
        write_fragment(out, child, depth + 1);
    }
}

fn gfx_to_table(gfx: &GfxReport) -> String {
    let mut out = String::new();
    out.push_str("Global:\n");
    write_metrics(&mut out, &gfx.global);
    for window in &gfx.windows {
        let _ = write!(out, "\nWindow {}", window.name);
        if let Some(ref views) = window.views {
            let _ = write!(out, "  ({} views, {})", views.view_count, views.render_node_usage);
        }
        out.push('\n');
        write_metrics(&mut out, &window.metrics);
    }
    let totals = &gfx.totals;
    if totals.view_roots > 0 || totals.attached_views > 0 {
        let _ = writeln!(
            out,
            "\nTotals: {} view roots, {} attached views, render nodes {} / {}",
            totals.view_roots,
            totals.attached_views,
            totals.render_node_used,
            totals.render_node_capacity
        );
    }
    out
}

fn write_metrics(out: &mut String, metrics: &FrameMetrics) {
    let _ = writeln!(
        out,
        "  frames {}  janky {} ({:.2}%)",
        metrics.total_frames, metrics.janky_frames, metrics.janky_percent
    );
    let _ = writeln!(
        out,
        "  cpu p50/p90/p95/p99  {}/{}/{}/{} ms",
        metrics.cpu.p50, metrics.cpu.p90, metrics.cpu.p95, metrics.cpu.p99
    );
    let _ = writeln!(
        out,
        "  gpu p50/p90/p95/p99  {}/{}/{}/{} ms",
        metrics.gpu.p50, metrics.gpu.p90, metrics.gpu.p95, metrics.gpu.p99
    );
    for reason in &metrics.jank_reasons {
        let _ = writeln!(out, "  {}: {}", reason.label, reason.count);
    }
}

fn cpu_to_table(cpu: &CpuSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Load: {} / {} / {}",
        cpu.load.one_minute, cpu.load.five_minutes, cpu.load.fifteen_minutes
    );
    if !cpu.time_range.start.is_empty() {
        let _ = writeln!(
            out,
            "Window: {} to {} ({} ms)",
            cpu.time_range.start, cpu.time_range.end, cpu.time_range.duration_ms
        );
    }
    let _ = writeln!(
        out,
        "Total: {}% ({}% user + {}% kernel + {}% iowait)",
        cpu.system.total_percent,
        cpu.system.user_percent,
        cpu.system.kernel_percent,
        cpu.system.iowait_percent
    );
    if let Some(ref target) = cpu.target {
        let _ = writeln!(
            out,
            "Target: {}/{} {}%",
            target.pid, target.process_name, target.total_percent
        );
    }
    for process in &cpu.processes {
        let _ = writeln!(
            out,
            "  {:>6}% {:>6}  {}",
            process.total_percent, process.pid, process.process_name
        );
    }
    out
}
