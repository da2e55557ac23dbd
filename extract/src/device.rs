//! Running diagnostic commands on a connected device.
//!
//! The engine itself only parses text. Fetching that text goes through the
//! [`CommandRunner`] trait so callers can inject a real bridge ([`AdbShell`])
//! or canned output ([`StaticRunner`]).

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;
use wait_timeout::ChildExt;

use crate::config::DeviceConfig;
use crate::error::DeviceError;

/// Runs one shell command on the device and returns its complete output.
///
/// Implementations must be shareable across threads; a snapshot issues its
/// dumps concurrently.
pub trait CommandRunner: Sync {
    fn execute(&self, command: &str) -> Result<String, DeviceError>;
}

/// A diagnostic dump and the shell command that produces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpRequest {
    Properties,
    Threads { pid: String },
    Activities,
    Graphics { package: String },
    Cpu,
    Pidof { package: String },
}

impl DumpRequest {
    /// The shell command line for this dump.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpscope_extract::device::DumpRequest;
    ///
    /// let request = DumpRequest::Graphics { package: "com.example".into() };
    /// assert_eq!(request.shell_command(), "dumpsys gfxinfo com.example");
    /// ```
    pub fn shell_command(&self) -> String {
        match self {
            Self::Properties => "getprop".to_string(),
            Self::Threads { pid } => format!("ps -T -p {pid}"),
            Self::Activities => "dumpsys activity top".to_string(),
            Self::Graphics { package } => format!("dumpsys gfxinfo {package}"),
            Self::Cpu => "dumpsys cpuinfo".to_string(),
            Self::Pidof { package } => format!("pidof {package}"),
        }
    }
}

/// Runs commands through `adb shell`.
#[derive(Debug, Clone)]
pub struct AdbShell {
    adb_path: PathBuf,
    serial: Option<String>,
    timeout: Duration,
}

impl AdbShell {
    pub fn new(adb_path: impl Into<PathBuf>, serial: Option<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
            timeout,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.adb_path.clone(),
            config.serial.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn argv(&self, command: &str) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(serial) = &self.serial {
            argv.push("-s".to_string());
            argv.push(serial.clone());
        }
        argv.push("shell".to_string());
        argv.push(command.to_string());
        argv
    }
}

impl CommandRunner for AdbShell {
    fn execute(&self, command: &str) -> Result<String, DeviceError> {
        let argv = self.argv(command);
        let started = Instant::now();
        let mut child = Command::new(&self.adb_path)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DeviceError::NotFound(self.adb_path.display().to_string()),
                _ => DeviceError::Io(e),
            })?;

        // Drain both pipes off-thread so a full pipe buffer cannot block the
        // child before it exits.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                debug!(command, timeout_ms = self.timeout.as_millis() as u64, "Device command timed out, killing bridge");
                let _ = child.kill();
                let _ = child.wait();
                return Err(DeviceError::Timeout {
                    command: command.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        debug!(
            command,
            status = ?status.code(),
            bytes = stdout.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Device command finished"
        );

        if !status.success() {
            return Err(DeviceError::CommandFailed {
                status: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "Failed to read bridge output");
        }
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let buf = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Replays recorded output keyed by command line.
///
/// # Examples
///
/// ```
/// use dumpscope_extract::device::{CommandRunner, StaticRunner};
///
/// let runner = StaticRunner::default().with_response("getprop", "[a]: [b]\n");
/// assert_eq!(runner.execute("getprop").unwrap(), "[a]: [b]\n");
/// assert!(runner.execute("dumpsys cpuinfo").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRunner {
    responses: HashMap<String, String>,
}

impl StaticRunner {
    pub fn with_response(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.responses.insert(command.into(), output.into());
        self
    }

    pub fn with_dump(self, request: &DumpRequest, output: impl Into<String>) -> Self {
        self.with_response(request.shell_command(), output)
    }
}

impl CommandRunner for StaticRunner {
    fn execute(&self, command: &str) -> Result<String, DeviceError> {
        self.responses
            .get(command)
            .cloned()
            .ok_or_else(|| DeviceError::NoResponse(command.to_string()))
    }
}

/// Resolves a package's main process id with `pidof`.
pub fn resolve_pid(runner: &dyn CommandRunner, package: &str) -> Result<Option<String>, DeviceError> {
    let output = runner.execute(
        &DumpRequest::Pidof {
            package: package.to_string(),
        }
        .shell_command(),
    )?;
    Ok(output
        .split_whitespace()
        .next()
        .filter(|pid| pid.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string))
}
