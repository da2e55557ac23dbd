//! Report type definitions for properties, process listings and CPU load.
//!
//! Every type here is produced fresh by one extraction call and owned by the
//! caller afterwards. All of them implement [`Default`], which is the shape an
//! extractor returns when its input is empty or unparseable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Decoded `[key]: [value]` property dump.
///
/// Keys are unique; a later occurrence of the same key replaces the earlier
/// one. Backed by a [`BTreeMap`] so output is deterministic.
///
/// # Examples
///
/// ```
/// use dumpscope_core::PropertyMap;
///
/// let mut props = PropertyMap::default();
/// props.insert("ro.build.version.sdk", "34");
/// assert_eq!(props.get("ro.build.version.sdk"), Some("34"));
/// assert_eq!(props.to_dump(), "[ro.build.version.sdk]: [34]\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<String, String>);

impl PropertyMap {
    /// Inserts a property, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, or an empty string.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Re-serializes the map in the `[key]: [value]` line format it was
    /// decoded from.
    pub fn to_dump(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            out.push_str(&format!("[{key}]: [{value}]\n"));
        }
        out
    }
}

impl FromIterator<(String, String)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Scheduler state code from the `S` column of a `ps` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreadState {
    /// `R`
    Running,
    /// `S`
    Sleeping,
    /// `D`
    DiskSleep,
    /// `T`
    Stopped,
    /// `t`
    TracingStop,
    /// `Z`
    Zombie,
    /// `X`
    Dead,
    /// `I`
    Idle,
    /// Any other single character.
    Other(char),
    /// Header rows, degraded rows, and empty state columns.
    #[default]
    Unknown,
}

impl ThreadState {
    /// Decodes a state column. Only the first character is significant.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpscope_core::ThreadState;
    ///
    /// assert_eq!(ThreadState::from_code("R"), ThreadState::Running);
    /// assert_eq!(ThreadState::from_code("W"), ThreadState::Other('W'));
    /// assert_eq!(ThreadState::from_code(""), ThreadState::Unknown);
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('R') => Self::Running,
            Some('S') => Self::Sleeping,
            Some('D') => Self::DiskSleep,
            Some('T') => Self::Stopped,
            Some('t') => Self::TracingStop,
            Some('Z') => Self::Zombie,
            Some('X') => Self::Dead,
            Some('I') => Self::Idle,
            Some(other) => Self::Other(other),
            None => Self::Unknown,
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::DiskSleep => "uninterruptible",
            Self::Stopped => "stopped",
            Self::TracingStop => "tracing stop",
            Self::Zombie => "zombie",
            Self::Dead => "dead",
            Self::Idle => "idle",
            Self::Other(_) => "other",
            Self::Unknown => "unknown",
        }
    }
}

/// How a row of a process listing was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RowKind {
    /// The column header row, retained only when row count is preserved.
    Header,
    /// A fully decoded row.
    #[default]
    Data,
    /// A short row; only `command` is set, holding the raw line.
    Degraded,
}

/// One row of a `ps -T` style listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabularRecord {
    pub kind: RowKind,
    pub owner: String,
    pub process_id: String,
    pub thread_id: String,
    pub parent_process_id: String,
    pub virtual_mem_kb: String,
    pub resident_mem_kb: String,
    pub wait_channel: String,
    pub program_counter: String,
    pub state: ThreadState,
    /// Final column; may contain whitespace.
    pub command: String,
}

impl TabularRecord {
    /// A degraded row carrying only the raw line.
    pub fn degraded(raw_line: &str) -> Self {
        Self {
            kind: RowKind::Degraded,
            command: raw_line.to_string(),
            ..Self::default()
        }
    }

    pub fn is_header(&self) -> bool {
        self.kind == RowKind::Header
    }
}

/// Process-level fields seeded from the first data row and shared by every
/// sibling thread row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub owner: String,
    pub pid: String,
    pub ppid: String,
    pub virtual_mem_kb: String,
    pub resident_mem_kb: String,
}

/// Result of decoding a process/thread listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessTable {
    /// Seeded from the first data row, if any.
    pub process: Option<ProcessSummary>,
    /// Rows in output order: header first when retained, then running rows,
    /// then everything else.
    pub records: Vec<TabularRecord>,
}

impl ProcessTable {
    /// Rows excluding a retained header.
    pub fn rows(&self) -> impl Iterator<Item = &TabularRecord> {
        self.records.iter().filter(|r| !r.is_header())
    }

    pub fn running_count(&self) -> usize {
        self.rows().filter(|r| r.state.is_running()).count()
    }
}

/// System load averages from the `Load:` line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadInfo {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

/// The sampling window a CPU report covers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// Human-readable start timestamp.
    pub start: String,
    /// Human-readable end timestamp.
    pub end: String,
    /// Window length in milliseconds.
    pub duration_ms: i64,
}

/// One process row of a CPU report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessCpuInfo {
    pub pid: u32,
    pub process_name: String,
    pub total_percent: f64,
    pub user_percent: f64,
    pub kernel_percent: f64,
    pub minor_faults: u64,
    pub major_faults: u64,
}

/// The `TOTAL:` aggregate line of a CPU report.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemCpuInfo {
    pub total_percent: f64,
    pub user_percent: f64,
    pub kernel_percent: f64,
    pub iowait_percent: f64,
    pub irq_percent: f64,
    pub softirq_percent: f64,
}

/// A decoded CPU accounting report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub load: LoadInfo,
    pub time_range: TimeRange,
    pub processes: Vec<ProcessCpuInfo>,
    /// First process whose name contains the requested target, if one was
    /// requested.
    pub target: Option<ProcessCpuInfo>,
    pub system: SystemCpuInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_last_write_wins() {
        let mut props = PropertyMap::default();
        props.insert("a", "1");
        props.insert("a", "2");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("a"), Some("2"));
        assert_eq!(props.get_or_empty("missing"), "");
    }

    #[test]
    fn test_property_map_serializes_as_plain_object() {
        let mut props = PropertyMap::default();
        props.insert("ro.product.model", "Pixel 8");
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["ro.product.model"], "Pixel 8");
    }

    #[test]
    fn test_thread_state_codes() {
        assert!(ThreadState::from_code("R").is_running());
        assert!(!ThreadState::from_code("S").is_running());
        assert_eq!(ThreadState::from_code("t"), ThreadState::TracingStop);
        assert_eq!(ThreadState::from_code("Z").label(), "zombie");
    }

    #[test]
    fn test_process_table_rows_skip_header() {
        let table = ProcessTable {
            process: None,
            records: vec![
                TabularRecord {
                    kind: RowKind::Header,
                    command: "CMD".into(),
                    ..TabularRecord::default()
                },
                TabularRecord {
                    state: ThreadState::Running,
                    ..TabularRecord::default()
                },
                TabularRecord::degraded("garbage"),
            ],
        };
        assert_eq!(table.rows().count(), 2);
        assert_eq!(table.running_count(), 1);
    }
}
