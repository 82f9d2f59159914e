//! Benchmark configuration: transfer kinds, size sweep, loop counts and
//! reporting units.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `loops` | 30 |
//! | `group_size` | 10 |
//! | `min_size` / `max_size` | 32 MiB / 256 MiB |
//! | `size_steps` | 1 |
//! | `kinds` | all four transfer kinds |
//! | `destination_flags` | DL, HV\|HCA, HV\|HCO |
//! | `profile_seconds` | 10 |
//! | `unit` | GiB/s |

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use membench_device::MemoryPropertyFlags;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_GROUP_SIZE, DEFAULT_LOOPS, DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE, DEFAULT_PROFILE_SECS,
    GIB, HEAP_HEADROOM_FRACTION, MIN_TEST_SIZE,
};
use crate::error::{BenchError, BenchResult};

/// Shape of a measured copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    /// Linear buffer to linear buffer.
    #[serde(rename = "buf2buf")]
    BufferToBuffer,
    /// Buffer into a linear-tiled image.
    #[serde(rename = "buf2img")]
    BufferToImage,
    /// Image read back into a buffer.
    #[serde(rename = "img2buf")]
    ImageToBuffer,
    /// Image to linear-tiled image.
    #[serde(rename = "img2img")]
    ImageToImage,
}

impl TransferKind {
    pub fn all() -> &'static [TransferKind] {
        &[
            TransferKind::BufferToBuffer,
            TransferKind::BufferToImage,
            TransferKind::ImageToBuffer,
            TransferKind::ImageToImage,
        ]
    }

    /// Short name used on the command line and in reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::BufferToBuffer => "buf2buf",
            Self::BufferToImage => "buf2img",
            Self::ImageToBuffer => "img2buf",
            Self::ImageToImage => "img2img",
        }
    }

    /// Row-index prefix in the text table.
    pub fn row_prefix(self) -> &'static str {
        match self {
            Self::BufferToBuffer => "B->B",
            Self::BufferToImage => "B->I",
            Self::ImageToBuffer => "I->B",
            Self::ImageToImage => "I->I",
        }
    }

    pub fn source_is_image(self) -> bool {
        matches!(self, Self::ImageToBuffer | Self::ImageToImage)
    }

    pub fn destination_is_image(self) -> bool {
        matches!(self, Self::BufferToImage | Self::ImageToImage)
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransferKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                BenchError::InvalidConfig(format!(
                    "unknown transfer kind '{}' (expected buf2buf, buf2img, img2buf or img2img)",
                    s
                ))
            })
    }
}

/// Unit in which throughput is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    /// 2^30 bytes per second.
    #[default]
    GiB,
    /// 10^9 bytes per second.
    GB,
}

impl SpeedUnit {
    /// Bytes per unit.
    pub fn bytes(self) -> f64 {
        match self {
            Self::GiB => GIB as f64,
            Self::GB => 1e9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GiB => "GiB/s",
            Self::GB => "GB/s",
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full benchmark run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Measured iterations per matrix cell.
    pub loops: usize,
    /// Elements in the source resource group.
    pub group_size: usize,
    /// Smallest swept size in bytes.
    pub min_size: u64,
    /// Largest swept size in bytes (before heap planning).
    pub max_size: u64,
    /// Equal intervals between `min_size` and `max_size`.
    pub size_steps: usize,
    /// Device to open.
    pub device_index: u32,
    /// Transfer kinds to run, in order.
    pub kinds: Vec<TransferKind>,
    /// Memory properties of the source group.
    pub source_flags: MemoryPropertyFlags,
    /// Destination memory candidates, resolved and de-duplicated by type index.
    pub destination_flags: Vec<MemoryPropertyFlags>,
    /// Run profile mode for this kind instead of the matrix.
    pub profile: Option<TransferKind>,
    /// Wall-clock length of profile mode.
    pub profile_seconds: f64,
    /// Run one copy per kind without statistics.
    pub dump: bool,
    /// Reporting unit.
    pub unit: SpeedUnit,
    /// Seed for resource picking and noise content. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Fraction of each heap the planner may fill.
    pub headroom: f64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            loops: DEFAULT_LOOPS,
            group_size: DEFAULT_GROUP_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            size_steps: 1,
            device_index: 0,
            kinds: TransferKind::all().to_vec(),
            source_flags: MemoryPropertyFlags::DEVICE_LOCAL,
            destination_flags: default_destinations(),
            profile: None,
            profile_seconds: DEFAULT_PROFILE_SECS as f64,
            dump: false,
            unit: SpeedUnit::GiB,
            seed: None,
            headroom: HEAP_HEADROOM_FRACTION,
        }
    }
}

/// Device-local, host-cached and host-coherent destinations.
pub fn default_destinations() -> Vec<MemoryPropertyFlags> {
    vec![
        MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
    ]
}

impl BenchConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// `BenchError::InvalidConfig` when the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> BenchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BenchError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            BenchError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    pub fn with_loops(mut self, loops: usize) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Sweep from `min` to `max` bytes in `steps` intervals.
    pub fn with_sizes(mut self, min: u64, max: u64, steps: usize) -> Self {
        self.min_size = min;
        self.max_size = max;
        self.size_steps = steps;
        self
    }

    /// Test a single size.
    pub fn with_size(self, size: u64) -> Self {
        self.with_sizes(size, size, 1)
    }

    pub fn with_kinds(mut self, kinds: &[TransferKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn with_source_flags(mut self, flags: MemoryPropertyFlags) -> Self {
        self.source_flags = flags;
        self
    }

    pub fn with_destinations(mut self, flags: &[MemoryPropertyFlags]) -> Self {
        self.destination_flags = flags.to_vec();
        self
    }

    pub fn with_profile(mut self, kind: TransferKind, seconds: f64) -> Self {
        self.profile = Some(kind);
        self.profile_seconds = seconds;
        self
    }

    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_unit(mut self, unit: SpeedUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_headroom(mut self, headroom: f64) -> Self {
        self.headroom = headroom;
        self
    }

    pub fn profile_duration(&self) -> Duration {
        Duration::from_secs_f64(self.profile_seconds)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `BenchError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> BenchResult<()> {
        let fail = |msg: String| Err(BenchError::InvalidConfig(msg));
        if self.loops == 0 {
            return fail("loops must be at least 1".to_string());
        }
        if self.group_size == 0 {
            return fail("group_size must be at least 1".to_string());
        }
        if self.min_size < MIN_TEST_SIZE {
            return fail(format!(
                "min_size must be at least {} bytes, got {}",
                MIN_TEST_SIZE, self.min_size
            ));
        }
        if self.max_size < self.min_size {
            return fail(format!(
                "max_size ({}) is smaller than min_size ({})",
                self.max_size, self.min_size
            ));
        }
        if self.size_steps == 0 {
            return fail("size_steps must be at least 1".to_string());
        }
        if self.kinds.is_empty() && self.profile.is_none() {
            return fail("at least one transfer kind is required".to_string());
        }
        if self.destination_flags.is_empty() {
            return fail("at least one destination memory type is required".to_string());
        }
        if self.profile.is_some() && self.dump {
            return fail("profile and dump modes are mutually exclusive".to_string());
        }
        if !self.profile_seconds.is_finite() || self.profile_seconds <= 0.0 {
            return fail(format!(
                "profile_seconds must be positive, got {}",
                self.profile_seconds
            ));
        }
        if !(self.headroom > 0.0 && self.headroom <= 1.0) {
            return fail(format!("headroom must be in (0, 1], got {}", self.headroom));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIB;

    #[test]
    fn test_defaults_validate() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.loops, 30);
        assert_eq!(config.group_size, 10);
        assert_eq!(config.kinds.len(), 4);
        assert_eq!(config.destination_flags.len(), 3);
        assert_eq!(config.profile_duration(), Duration::from_secs(10));
        println!("[PASS] Default configuration is valid");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = BenchConfig::default();
        assert!(base.clone().with_loops(0).validate().is_err());
        assert!(base.clone().with_group_size(0).validate().is_err());
        assert!(base.clone().with_sizes(64 * MIB, 32 * MIB, 1).validate().is_err());
        assert!(base.clone().with_sizes(32 * MIB, 64 * MIB, 0).validate().is_err());
        assert!(base.clone().with_size(1024).validate().is_err());
        assert!(base.clone().with_destinations(&[]).validate().is_err());
        assert!(base.clone().with_headroom(1.5).validate().is_err());
        assert!(base
            .clone()
            .with_profile(TransferKind::BufferToBuffer, 1.0)
            .with_dump(true)
            .validate()
            .is_err());
        assert!(base
            .with_profile(TransferKind::BufferToBuffer, 0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_transfer_kind_names() {
        for kind in TransferKind::all() {
            assert_eq!(kind.name().parse::<TransferKind>().unwrap(), *kind);
        }
        assert!("img2foo".parse::<TransferKind>().is_err());
        assert!(TransferKind::ImageToBuffer.source_is_image());
        assert!(!TransferKind::ImageToBuffer.destination_is_image());
        assert_eq!(TransferKind::ImageToBuffer.row_prefix(), "I->B");
    }

    #[test]
    fn test_json_partial_config() {
        let config: BenchConfig = serde_json::from_str(
            r#"{"loops": 5, "kinds": ["buf2buf", "img2img"], "unit": "gb",
                "destination_flags": ["DL", "HV|HCO"]}"#,
        )
        .unwrap();
        assert_eq!(config.loops, 5);
        assert_eq!(
            config.kinds,
            vec![TransferKind::BufferToBuffer, TransferKind::ImageToImage]
        );
        assert_eq!(config.unit, SpeedUnit::GB);
        assert_eq!(config.destination_flags[1].short_name(), "HV|HCO");
        assert_eq!(config.group_size, DEFAULT_GROUP_SIZE);
    }

    #[test]
    fn test_speed_units() {
        assert_eq!(SpeedUnit::GiB.bytes(), 1073741824.0);
        assert_eq!(SpeedUnit::GB.bytes(), 1e9);
        assert_eq!(SpeedUnit::default().label(), "GiB/s");
    }
}
