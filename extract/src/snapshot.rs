//! Fetching and parsing reports from a live device.
//!
//! [`capture_report`] fetches one dump and fails if the device does.
//! [`capture_snapshot`] fetches everything; a dump that cannot be fetched is
//! logged and its report is left at the default, so one broken command never
//! loses the rest of the snapshot.

use chrono::Utc;
use tracing::{debug, warn};

use dumpscope_core::{DeviceInfo, DeviceSnapshot, ProcessTable};

use crate::device::{CommandRunner, DumpRequest, resolve_pid};
use crate::error::DeviceError;
use crate::parser::activity::parse_activities;
use crate::parser::cpu::parse_cpuinfo;
use crate::parser::gfx::parse_gfxinfo;
use crate::parser::props::parse_properties;
use crate::parser::table::parse_process_table;
use crate::{ExtractOptions, Report, ReportKind, parse_report};

/// Fetches and parses a single report.
///
/// `target` is a package name. [`ReportKind::Gfx`] and
/// [`ReportKind::Threads`] require it; for threads a numeric target is used
/// as the process id directly, anything else is resolved with `pidof`.
///
/// # Errors
///
/// Returns the [`DeviceError`] of the failing command, or
/// [`DeviceError::NoProcess`] when a required target is missing or not
/// running.
pub fn capture_report(
    runner: &dyn CommandRunner,
    kind: ReportKind,
    target: Option<&str>,
    options: &ExtractOptions,
) -> Result<Report, DeviceError> {
    let request = request_for(runner, kind, target)?;
    let text = runner.execute(&request.shell_command())?;
    Ok(parse_report(kind, &text, target, options))
}

fn request_for(
    runner: &dyn CommandRunner,
    kind: ReportKind,
    target: Option<&str>,
) -> Result<DumpRequest, DeviceError> {
    let request = match kind {
        ReportKind::Props => DumpRequest::Properties,
        ReportKind::Activities => DumpRequest::Activities,
        ReportKind::Cpu => DumpRequest::Cpu,
        ReportKind::Gfx => DumpRequest::Graphics {
            package: require_target(target)?.to_string(),
        },
        ReportKind::Threads => {
            let target = require_target(target)?;
            let pid = if is_pid(target) {
                Some(target.to_string())
            } else {
                resolve_pid(runner, target)?
            };
            DumpRequest::Threads {
                pid: pid.ok_or_else(|| DeviceError::NoProcess(target.to_string()))?,
            }
        }
    };
    Ok(request)
}

fn require_target(target: Option<&str>) -> Result<&str, DeviceError> {
    target
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| DeviceError::NoProcess("no target given".to_string()))
}

fn is_pid(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Captures every report in one pass.
///
/// Properties, activities, CPU and (with a target) graphics are fetched
/// concurrently. The thread listing is fetched last, for the target's process
/// id taken from its activity, its CPU row, or `pidof`, in that order. Without
/// a target the graphics and thread reports stay empty.
pub fn capture_snapshot(
    runner: &dyn CommandRunner,
    target: Option<&str>,
    options: &ExtractOptions,
) -> DeviceSnapshot {
    let ((props, activities), (cpu, graphics)) = rayon::join(
        || {
            rayon::join(
                || fetch(runner, &DumpRequest::Properties),
                || fetch(runner, &DumpRequest::Activities),
            )
        },
        || {
            rayon::join(
                || fetch(runner, &DumpRequest::Cpu),
                || match target {
                    Some(package) => fetch(
                        runner,
                        &DumpRequest::Graphics {
                            package: package.to_string(),
                        },
                    ),
                    None => String::new(),
                },
            )
        },
    );

    let mut snapshot = DeviceSnapshot {
        captured_at: Utc::now(),
        target: target.map(str::to_string),
        device: DeviceInfo::from_properties(&parse_properties(&props)),
        activities: parse_activities(&activities, &options.activity),
        graphics: parse_gfxinfo(&graphics),
        cpu: parse_cpuinfo(&cpu, target),
        threads: ProcessTable::default(),
    };

    if let Some(pid) = target_pid(runner, &snapshot) {
        let threads = fetch(runner, &DumpRequest::Threads { pid });
        snapshot.threads = parse_process_table(&threads, &options.table);
    }
    debug!(
        activities = snapshot.activities.len(),
        windows = snapshot.graphics.windows.len(),
        processes = snapshot.cpu.processes.len(),
        threads = snapshot.threads.records.len(),
        "Captured device snapshot"
    );
    snapshot
}

fn target_pid(runner: &dyn CommandRunner, snapshot: &DeviceSnapshot) -> Option<String> {
    let target = snapshot.target.as_deref()?;
    if let Some(activity) = snapshot.target_activity().filter(|a| is_pid(&a.pid)) {
        return Some(activity.pid.clone());
    }
    if let Some(process) = snapshot.cpu.target.as_ref().filter(|p| p.pid > 0) {
        return Some(process.pid.to_string());
    }
    match resolve_pid(runner, target) {
        Ok(pid) => pid,
        Err(e) => {
            warn!(target, error = %e, "Could not resolve target pid, skipping thread listing");
            None
        }
    }
}

fn fetch(runner: &dyn CommandRunner, request: &DumpRequest) -> String {
    let command = request.shell_command();
    match runner.execute(&command) {
        Ok(text) => text,
        Err(e) => {
            warn!(command = %command, error = %e, "Dump failed, report left empty");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StaticRunner;

    const PROPS: &str = "\
[ro.product.brand]: [google]
[ro.product.model]: [Pixel 8]
[ro.build.version.release]: [15]
[ro.build.version.sdk]: [35]
";

    const ACTIVITIES: &str = "\
TASK 12 id=88 userId=0
  ACTIVITY com.example/.MainActivity 3c1f2a pid=4521
    Local Activity 8b4e1d State:
      mResumed=true mStopped=false mFinished=false
";

    const CPU: &str = "\
Load: 2.5 / 1.5 / 0.5
CPU usage from 6000ms to 1000ms ago (10:00:00.000 to 10:00:05.000):
  12% 4600/com.other: 10% user + 2% kernel
  8% 4521/com.example: 6% user + 2% kernel
30% TOTAL: 20% user + 10% kernel
";

    const THREADS: &str = "\
USER           PID   TID  PPID     VSZ    RSS WCHAN            ADDR S CMD
u0_a123       4521  4521   612 15849124 201624 do_epoll_wait      0 S com.example
u0_a123       4521  4533   612 15849124 201624 0                  0 R RenderThread
";

    fn full_runner() -> StaticRunner {
        StaticRunner::default()
            .with_dump(&DumpRequest::Properties, PROPS)
            .with_dump(&DumpRequest::Activities, ACTIVITIES)
            .with_dump(&DumpRequest::Cpu, CPU)
            .with_dump(
                &DumpRequest::Graphics {
                    package: "com.example".into(),
                },
                "Total frames rendered: 120\nJanky frames: 6 (5.00%)\n",
            )
            .with_dump(&DumpRequest::Threads { pid: "4521".into() }, THREADS)
    }

    #[test]
    fn test_snapshot_with_target() {
        let snapshot = capture_snapshot(&full_runner(), Some("com.example"), &ExtractOptions::default());
        assert_eq!(snapshot.device.model, "Pixel 8");
        assert_eq!(snapshot.device.sdk, "35");
        assert_eq!(snapshot.activities.len(), 1);
        assert_eq!(snapshot.graphics.global.total_frames, 120);
        assert_eq!(snapshot.cpu.target.as_ref().map(|p| p.pid), Some(4521));
        assert_eq!(snapshot.threads.records.len(), 2);
        assert_eq!(snapshot.threads.running_count(), 1);
        assert_eq!(snapshot.target_activity().map(|a| a.pid.as_str()), Some("4521"));
    }

    #[test]
    fn test_snapshot_without_target_skips_focused_reports() {
        let snapshot = capture_snapshot(&full_runner(), None, &ExtractOptions::default());
        assert_eq!(snapshot.target, None);
        assert_eq!(snapshot.graphics, Default::default());
        assert_eq!(snapshot.threads, ProcessTable::default());
        assert_eq!(snapshot.cpu.processes.len(), 2);
    }

    #[test]
    fn test_failed_dump_degrades_only_its_report() {
        let runner = StaticRunner::default()
            .with_dump(&DumpRequest::Properties, PROPS)
            .with_dump(&DumpRequest::Cpu, CPU);
        let snapshot = capture_snapshot(&runner, Some("com.example"), &ExtractOptions::default());
        assert_eq!(snapshot.device.brand, "google");
        assert!(snapshot.activities.is_empty());
        assert_eq!(snapshot.cpu.load.one_minute, 2.5);
        // pid falls back to the CPU row; the thread dump itself is missing.
        assert_eq!(snapshot.threads, ProcessTable::default());
    }

    #[test]
    fn test_target_pid_falls_back_to_pidof() {
        let runner = StaticRunner::default()
            .with_response("pidof com.example", "4521\n")
            .with_dump(&DumpRequest::Threads { pid: "4521".into() }, THREADS);
        let snapshot = capture_snapshot(&runner, Some("com.example"), &ExtractOptions::default());
        assert_eq!(snapshot.threads.records.len(), 2);
    }

    #[test]
    fn test_capture_report_threads_by_package_and_pid() {
        let runner = full_runner().with_response("pidof com.example", "4521\n");
        let options = ExtractOptions::default();
        for target in ["com.example", "4521"] {
            let report = capture_report(&runner, ReportKind::Threads, Some(target), &options).unwrap();
            let Report::Threads(table) = report else {
                panic!("expected threads report");
            };
            assert_eq!(table.records.len(), 2, "{target}");
        }
    }

    #[test]
    fn test_capture_report_requires_target() {
        let options = ExtractOptions::default();
        for kind in [ReportKind::Gfx, ReportKind::Threads] {
            let err = capture_report(&full_runner(), kind, None, &options).unwrap_err();
            assert!(matches!(err, DeviceError::NoProcess(_)), "{kind:?}: {err}");
        }
    }

    #[test]
    fn test_capture_report_propagates_device_errors() {
        let err = capture_report(
            &StaticRunner::default(),
            ReportKind::Props,
            None,
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeviceError::NoResponse(_)));
    }

    #[test]
    fn test_capture_report_not_running() {
        let runner = StaticRunner::default().with_response("pidof com.gone", "");
        let err = capture_report(&runner, ReportKind::Threads, Some("com.gone"), &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeviceError::NoProcess(ref t) if t == "com.gone"));
    }
}
