use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dumpscope_core::RollingHistory;
use dumpscope_extract::config::MonitorConfig;
use dumpscope_extract::device::AdbShell;
use dumpscope_extract::error::DeviceError;
use dumpscope_extract::output::{OutputFormat, format_report, format_snapshot};
use dumpscope_extract::parser::fragment::FragmentGrouping;
use dumpscope_extract::parser::table::RowPolicy;
use dumpscope_extract::snapshot::{capture_report, capture_snapshot};
use dumpscope_extract::{ExtractOptions, Report, ReportKind, parse_report};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Table,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
            CliOutputFormat::Table => Self::Table,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dumpscope")]
#[command(about = "Parse and capture Android diagnostic dumps")]
struct Cli {
    /// Log extractor decisions at debug level (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a captured dump from a file.
    ParseFile(ParseFileArgs),
    /// Parse a captured dump from stdin.
    ParseStdin(ParseStdinArgs),
    /// Capture and parse one report from a connected device.
    Capture(CaptureArgs),
    /// Capture every report from a connected device.
    Snapshot(SnapshotArgs),
    /// Poll CPU load and print rolling statistics.
    Watch(WatchArgs),
    /// Write a default configuration file.
    InitConfig(InitConfigArgs),
}

/// Extractor switches shared by the offline parse commands.
#[derive(Debug, Args)]
struct ParsingArgs {
    /// How to handle short rows in a thread listing.
    #[arg(long, default_value = "drop")]
    table_policy: RowPolicy,
    /// How child fragments are matched to their parent.
    #[arg(long, default_value = "instance")]
    fragment_grouping: FragmentGrouping,
}

impl ParsingArgs {
    fn options(&self) -> ExtractOptions {
        let mut options = ExtractOptions::default();
        options.table.policy = self.table_policy;
        options.activity.grouping = self.fragment_grouping;
        options
    }
}

#[derive(Debug, Args)]
struct ParseFileArgs {
    /// Kind of dump in the file.
    #[arg(long)]
    kind: ReportKind,
    /// Path to the captured dump.
    #[arg(long)]
    input: PathBuf,
    /// Target process name (selects the CPU target row).
    #[arg(long)]
    target: Option<String>,
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    #[command(flatten)]
    parsing: ParsingArgs,
}

#[derive(Debug, Args)]
struct ParseStdinArgs {
    /// Kind of dump on stdin.
    #[arg(long)]
    kind: ReportKind,
    /// Target process name (selects the CPU target row).
    #[arg(long)]
    target: Option<String>,
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    #[command(flatten)]
    parsing: ParsingArgs,
}

/// Device selection shared by the live commands.
#[derive(Debug, Args)]
struct DeviceArgs {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Target package (overrides the configured target).
    #[arg(long)]
    target: Option<String>,
    /// Device serial (overrides the configured serial).
    #[arg(long)]
    serial: Option<String>,
}

impl DeviceArgs {
    fn load_config(&self) -> Result<MonitorConfig, String> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)
                .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
            None => MonitorConfig::default(),
        };
        if let Some(target) = &self.target {
            config.target = Some(target.clone());
        }
        if let Some(serial) = &self.serial {
            config.device.serial = Some(serial.clone());
        }
        config.validate().map_err(|err| err.to_string())?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct CaptureArgs {
    /// Kind of report to capture.
    #[arg(long)]
    kind: ReportKind,
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Debug, Args)]
struct SnapshotArgs {
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Stop after this many polls, failed ones included (default: run until
    /// interrupted).
    #[arg(long)]
    samples: Option<usize>,
    /// Print each sample as a JSON line.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Where to write the configuration.
    #[arg(long)]
    output: PathBuf,
    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::ParseFile(args) => run_parse_file(args),
        Command::ParseStdin(args) => run_parse_stdin(args),
        Command::Capture(args) => run_capture(args),
        Command::Snapshot(args) => run_snapshot(args),
        Command::Watch(args) => run_watch(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_parse_file(args: ParseFileArgs) -> Result<(), String> {
    let text = fs::read_to_string(&args.input)
        .map_err(|err| format!("Failed to read '{}': {err}", args.input.display()))?;
    print_parsed(
        args.kind,
        &text,
        args.target.as_deref(),
        &args.parsing.options(),
        args.format.into(),
    )
}

fn run_parse_stdin(args: ParseStdinArgs) -> Result<(), String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|err| format!("Failed to read stdin: {err}"))?;
    print_parsed(
        args.kind,
        &text,
        args.target.as_deref(),
        &args.parsing.options(),
        args.format.into(),
    )
}

fn print_parsed(
    kind: ReportKind,
    text: &str,
    target: Option<&str>,
    options: &ExtractOptions,
    format: OutputFormat,
) -> Result<(), String> {
    debug!(?kind, bytes = text.len(), "Parsing captured dump");
    let report = parse_report(kind, text, target, options);
    print_output(format_report(&report, format)?);
    Ok(())
}

fn run_capture(args: CaptureArgs) -> Result<(), String> {
    let config = args.device.load_config()?;
    let runner = AdbShell::from_config(&config.device);
    let report = capture_report(
        &runner,
        args.kind,
        config.target.as_deref(),
        &config.extract_options(),
    )
    .map_err(|err| err.to_string())?;
    print_output(format_report(&report, args.format.into())?);
    Ok(())
}

fn run_snapshot(args: SnapshotArgs) -> Result<(), String> {
    let config = args.device.load_config()?;
    let runner = AdbShell::from_config(&config.device);
    let snapshot = capture_snapshot(&runner, config.target.as_deref(), &config.extract_options());
    print_output(format_snapshot(&snapshot, args.format.into())?);
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct WatchSample {
    at: chrono::DateTime<chrono::Utc>,
    load_1m: f64,
    min: f64,
    max: f64,
    average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_percent: Option<f64>,
}

fn run_watch(args: WatchArgs) -> Result<(), String> {
    let config = args.device.load_config()?;
    let runner = AdbShell::from_config(&config.device);
    let options = config.extract_options();
    let target = config.target.as_deref();
    let mut history = RollingHistory::new(config.poll.history_capacity);

    info!(
        interval_ms = config.poll.interval_ms,
        capacity = config.poll.history_capacity,
        "Watching CPU load"
    );

    let mut polls = 0usize;
    loop {
        match capture_report(&runner, ReportKind::Cpu, target, &options) {
            Ok(Report::Cpu(cpu)) => {
                history.push(cpu.load.one_minute);
                let sample = WatchSample {
                    at: chrono::Utc::now(),
                    load_1m: cpu.load.one_minute,
                    min: history.min().unwrap_or_default(),
                    max: history.max().unwrap_or_default(),
                    average: history.average().unwrap_or_default(),
                    target_percent: cpu.target.map(|p| p.total_percent),
                };
                print_sample(&sample, args.json)?;
            }
            Ok(_) => return Err("device returned a non-CPU report".to_string()),
            // No bridge to retry against.
            Err(err @ DeviceError::NotFound(_)) => return Err(err.to_string()),
            Err(err) => warn!(error = %err, poll = polls + 1, "Skipping failed CPU sample"),
        }

        polls += 1;
        if args.samples.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
        std::thread::sleep(config.poll.interval());
    }
}

fn print_sample(sample: &WatchSample, json: bool) -> Result<(), String> {
    if json {
        let line = serde_json::to_string(sample)
            .map_err(|err| format!("JSON serialization failed: {err}"))?;
        println!("{line}");
        return Ok(());
    }
    print!(
        "{}  load {:>6.2}  min {:>6.2}  max {:>6.2}  avg {:>6.2}",
        sample.at.format("%H:%M:%S"),
        sample.load_1m,
        sample.min,
        sample.max,
        sample.average
    );
    match sample.target_percent {
        Some(percent) => println!("  target {percent:.1}%"),
        None => println!(),
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.output.display()
        ));
    }
    MonitorConfig::default()
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;
    eprintln!("Wrote {}", args.output.display());
    Ok(())
}

fn print_output(output: String) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}
