use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActivityRecord, CpuSnapshot, GfxReport, ProcessTable, PropertyMap};

/// Identity of the connected device, derived from its property dump.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub brand: String,
    pub model: String,
    pub release: String,
    pub sdk: String,
    pub abi: String,
}

impl DeviceInfo {
    /// Reads the well-known `ro.*` keys; missing keys become empty strings.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpscope_core::{DeviceInfo, PropertyMap};
    ///
    /// let mut props = PropertyMap::default();
    /// props.insert("ro.product.model", "Pixel 8");
    /// let info = DeviceInfo::from_properties(&props);
    /// assert_eq!(info.model, "Pixel 8");
    /// assert_eq!(info.sdk, "");
    /// ```
    pub fn from_properties(props: &PropertyMap) -> Self {
        Self {
            brand: props.get_or_empty("ro.product.brand").to_string(),
            model: props.get_or_empty("ro.product.model").to_string(),
            release: props.get_or_empty("ro.build.version.release").to_string(),
            sdk: props.get_or_empty("ro.build.version.sdk").to_string(),
            abi: props.get_or_empty("ro.product.cpu.abi").to_string(),
        }
    }
}

/// All reports captured from a device in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub captured_at: DateTime<Utc>,
    /// Package the snapshot was focused on, if any.
    pub target: Option<String>,
    pub device: DeviceInfo,
    pub activities: Vec<ActivityRecord>,
    pub graphics: GfxReport,
    pub cpu: CpuSnapshot,
    pub threads: ProcessTable,
}

impl DeviceSnapshot {
    /// The activity belonging to the target package, preferring a resumed one.
    pub fn target_activity(&self) -> Option<&ActivityRecord> {
        let target = self.target.as_deref()?;
        let matching: Vec<&ActivityRecord> = self
            .activities
            .iter()
            .filter(|a| a.package == target)
            .collect();
        matching
            .iter()
            .find(|a| a.resumed)
            .or(matching.first())
            .copied()
    }
}
