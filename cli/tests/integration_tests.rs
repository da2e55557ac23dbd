//! Integration tests for the offline parse commands, config handling, and
//! live capture through a stand-in bridge script.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn dumpscope_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dumpscope"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("extract")
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(dumpscope_bin())
        .args(args)
        .output()
        .expect("failed to run dumpscope")
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(dumpscope_bin())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn dumpscope");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for dumpscope")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "dumpscope failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("Invalid JSON output: {e}\n{stdout}"))
}

// ---- parse-file / parse-stdin ----

#[test]
fn test_parse_file_cpu_json() {
    let input = fixture("cpuinfo.txt");
    let output = run(&[
        "parse-file",
        "--kind",
        "cpu",
        "--target",
        "com.example",
        "--input",
        input.to_str().unwrap(),
    ]);
    assert_success(&output);
    let json = stdout_json(&output);
    assert_eq!(json["load"]["one_minute"], 10.05);
    assert_eq!(json["time_range"]["duration_ms"], 10960);
    assert_eq!(json["target"]["pid"], 4521);
    assert_eq!(json["processes"].as_array().map(Vec::len), Some(5));
}

#[test]
fn test_parse_file_threads_degrade_policy() {
    let input = fixture("ps_threads.txt");
    let output = run(&[
        "parse-file",
        "--kind",
        "threads",
        "--table-policy",
        "degrade",
        "--input",
        input.to_str().unwrap(),
    ]);
    assert_success(&output);
    let json = stdout_json(&output);
    let records = json["records"].as_array().expect("records array");
    assert_eq!(records.len(), 9);
    assert_eq!(records[0]["kind"], "Header");
}

#[test]
fn test_parse_file_activities_table() {
    let input = fixture("activity_top.txt");
    let output = run(&[
        "parse-file",
        "--kind",
        "activities",
        "--format",
        "table",
        "--input",
        input.to_str().unwrap(),
    ]);
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("com.example.MainActivity  pid 4521  [resumed]  4 fragments"));
    assert!(stdout.contains("    FeedFragment{d4e5f6} RESUMED tag=feed"));
    assert!(stdout.contains("com.example.SettingsActivity  pid 4521  [stopped]  0 fragments"));
}

#[test]
fn test_parse_stdin_props_yaml() {
    let output = run_with_stdin(
        &["parse-stdin", "--kind", "props", "--format", "yaml"],
        "[ro.product.model]: [Pixel 8]\n[ro.build.version.sdk]: [35]\n",
    );
    assert_success(&output);
    let yaml: serde_yaml::Value =
        serde_yaml::from_slice(&output.stdout).expect("stdout should be YAML");
    assert_eq!(yaml["ro.product.model"].as_str(), Some("Pixel 8"));
    assert_eq!(yaml["ro.build.version.sdk"].as_str(), Some("35"));
}

#[test]
fn test_parse_stdin_garbage_gives_default_report() {
    let output = run_with_stdin(&["parse-stdin", "--kind", "gfx"], "not a graphics dump\n");
    assert_success(&output);
    let json = stdout_json(&output);
    assert_eq!(json["global"]["total_frames"], 0);
    assert_eq!(json["windows"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_parse_file_missing_input_fails() {
    let output = run(&[
        "parse-file",
        "--kind",
        "cpu",
        "--input",
        "/nonexistent/cpuinfo.txt",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: Failed to read"), "{stderr}");
}

#[test]
fn test_unknown_kind_is_rejected() {
    let output = run(&["parse-stdin", "--kind", "battery"]);
    assert!(!output.status.success());
}

// ---- init-config ----

#[test]
fn test_init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dumpscope.yaml");

    let output = run(&["init-config", "--output", path.to_str().unwrap()]);
    assert_success(&output);
    let yaml: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(yaml["poll"]["interval_ms"].as_u64(), Some(1500));
    assert_eq!(yaml["parsing"]["table_policy"].as_str(), Some("drop"));

    let again = run(&["init-config", "--output", path.to_str().unwrap()]);
    assert!(!again.status.success());
    let forced = run(&["init-config", "--force", "--output", path.to_str().unwrap()]);
    assert_success(&forced);
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "poll:\n  history_capacity: 0\n").unwrap();
    let output = run(&["snapshot", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("history_capacity"), "{stderr}");
}

// ---- live capture ----

#[test]
fn test_capture_with_missing_bridge_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("dumpscope.yaml");
    fs::write(&config, "device:\n  adb_path: /nonexistent/adb\n").unwrap();
    let output = run(&["capture", "--kind", "props", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("executable not found"), "{stderr}");
}

/// Writes a stand-in `adb` that answers `shell <command>` from the fixtures,
/// plus a config pointing at it.
#[cfg(unix)]
fn fake_device(dir: &Path) -> PathBuf {
    fake_device_with_cpu(dir, r#"cat "{fixtures}/cpuinfo.txt""#)
}

/// Like [`fake_device`], but `dumpsys cpuinfo` runs `cpu_script`, in which
/// `{fixtures}` and `{dir}` are substituted.
#[cfg(unix)]
fn fake_device_with_cpu(dir: &Path, cpu_script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let fixtures = fixture("");
    let fixtures = fixtures.to_str().unwrap();
    let cpu_script = cpu_script
        .replace("{fixtures}", fixtures)
        .replace("{dir}", dir.to_str().unwrap());
    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
[ "$1" = "shell" ] || exit 2
case "$2" in
  "getprop") cat "{fixtures}/getprop.txt" ;;
  "dumpsys activity top") cat "{fixtures}/activity_top.txt" ;;
  "dumpsys cpuinfo") {cpu_script} ;;
  "dumpsys gfxinfo com.example") cat "{fixtures}/gfxinfo.txt" ;;
  "ps -T -p 4521") cat "{fixtures}/ps_threads.txt" ;;
  "pidof com.example") echo 4521 ;;
  *) echo "unknown command: $2" >&2; exit 1 ;;
esac
"#
    );
    let adb = dir.join("adb");
    fs::write(&adb, script).unwrap();
    fs::set_permissions(&adb, fs::Permissions::from_mode(0o755)).unwrap();

    let config = dir.join("dumpscope.yaml");
    fs::write(
        &config,
        format!(
            "target: com.example\ndevice:\n  adb_path: '{}'\n  serial: emulator-5554\npoll:\n  interval_ms: 10\n",
            adb.display()
        ),
    )
    .unwrap();
    config
}

#[cfg(unix)]
#[test]
fn test_capture_threads_resolves_pid() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_device(dir.path());
    let output = run(&["capture", "--kind", "threads", "--config", config.to_str().unwrap()]);
    assert_success(&output);
    let json = stdout_json(&output);
    assert_eq!(json["process"]["pid"], "4521");
    assert_eq!(json["records"].as_array().map(Vec::len), Some(7));
}

#[cfg(unix)]
#[test]
fn test_capture_reports_device_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_device(dir.path());
    let output = run(&[
        "capture",
        "--kind",
        "gfx",
        "--target",
        "com.other",
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown command: dumpsys gfxinfo com.other"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn test_snapshot_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_device(dir.path());
    let output = run(&["snapshot", "--config", config.to_str().unwrap()]);
    assert_success(&output);
    let json = stdout_json(&output);
    assert_eq!(json["target"], "com.example");
    assert_eq!(json["device"]["model"], "Pixel 8 Pro");
    assert_eq!(json["activities"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["graphics"]["global"]["total_frames"], 1200);
    assert_eq!(json["cpu"]["target"]["pid"], 4521);
    assert_eq!(json["threads"]["records"].as_array().map(Vec::len), Some(7));
    assert!(json["captured_at"].is_string());
}

#[cfg(unix)]
#[test]
fn test_watch_prints_requested_samples() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_device(dir.path());
    let output = run(&[
        "watch",
        "--samples",
        "3",
        "--json",
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let samples: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each sample is a JSON line"))
        .collect();
    assert_eq!(samples.len(), 3);
    for sample in &samples {
        assert_eq!(sample["load_1m"], 10.05);
        let average = sample["average"].as_f64().expect("average is a number");
        assert!((average - 10.05).abs() < 1e-9, "{average}");
        assert_eq!(sample["target_percent"], 140.0);
    }
}

#[cfg(unix)]
#[test]
fn test_watch_skips_failed_polls() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_device_with_cpu(
        dir.path(),
        r#"if [ -e "{dir}/cpu_seen" ]; then cat "{fixtures}/cpuinfo.txt"; else touch "{dir}/cpu_seen"; echo "device offline" >&2; exit 1; fi"#,
    );
    let output = run(&[
        "watch",
        "--samples",
        "3",
        "--json",
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let samples: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each sample is a JSON line"))
        .collect();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0]["load_1m"], 10.05);
}

#[test]
fn test_watch_with_missing_bridge_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("dumpscope.yaml");
    fs::write(&config, "device:\n  adb_path: /nonexistent/adb\npoll:\n  interval_ms: 10\n").unwrap();
    let output = run(&["watch", "--samples", "5", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("executable not found"), "{stderr}");
}
