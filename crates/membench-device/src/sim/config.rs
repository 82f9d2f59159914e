//! Simulated device configuration and presets.

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};
use crate::memory::{MemoryHeap, MemoryLayout, MemoryPropertyFlags, MemoryType};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Default per-copy relative jitter (uniform, +/-).
pub const DEFAULT_JITTER: f64 = 0.03;
/// Default probability that a copy stalls.
pub const DEFAULT_OUTLIER_RATE: f64 = 0.02;
/// Default slowdown applied to a stalled copy.
pub const DEFAULT_OUTLIER_FACTOR: f64 = 8.0;
/// Fixed cost of one copy command on the virtual GPU clock.
pub const DEFAULT_COPY_OVERHEAD_NS: u64 = 2_000;

/// Built-in device shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPreset {
    /// Discrete card: VRAM heap, system-RAM heap, small BAR window.
    Discrete,
    /// Integrated GPU: one shared heap, every type device-local.
    Integrated,
}

impl SimPreset {
    /// Presets in device-index order.
    pub const ALL: [SimPreset; 2] = [SimPreset::Discrete, SimPreset::Integrated];

    pub fn device_name(self) -> &'static str {
        match self {
            Self::Discrete => "Simulated Discrete GPU",
            Self::Integrated => "Simulated Integrated GPU",
        }
    }

    pub fn max_allocation_size(self) -> u64 {
        match self {
            Self::Discrete => 4 * GIB,
            Self::Integrated => 2 * GIB,
        }
    }

    /// Heaps and memory types of the preset.
    ///
    /// | Preset | Heaps | Types |
    /// |--------|-------|-------|
    /// | Discrete | 8 GiB VRAM, 16 GiB host, 256 MiB BAR | DL, HV\|HCO, HV\|HCO\|HCA, DL\|HV\|HCO |
    /// | Integrated | 4 GiB shared | DL, DL\|HV\|HCO, DL\|HV\|HCO\|HCA |
    pub fn layout(self) -> DeviceResult<MemoryLayout> {
        let dl = MemoryPropertyFlags::DEVICE_LOCAL;
        let hv = MemoryPropertyFlags::HOST_VISIBLE;
        let hco = MemoryPropertyFlags::HOST_COHERENT;
        let hca = MemoryPropertyFlags::HOST_CACHED;
        match self {
            Self::Discrete => MemoryLayout::new(
                vec![
                    MemoryHeap { size: 8 * GIB, device_local: true },
                    MemoryHeap { size: 16 * GIB, device_local: false },
                    MemoryHeap { size: 256 * MIB, device_local: true },
                ],
                vec![
                    MemoryType { flags: dl, heap_index: 0 },
                    MemoryType { flags: hv | hco, heap_index: 1 },
                    MemoryType { flags: hv | hco | hca, heap_index: 1 },
                    MemoryType { flags: dl | hv | hco, heap_index: 2 },
                ],
            ),
            Self::Integrated => MemoryLayout::new(
                vec![MemoryHeap { size: 4 * GIB, device_local: true }],
                vec![
                    MemoryType { flags: dl, heap_index: 0 },
                    MemoryType { flags: dl | hv | hco, heap_index: 0 },
                    MemoryType { flags: dl | hv | hco | hca, heap_index: 0 },
                ],
            ),
        }
    }
}

/// Simulated device behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Noise seed. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Relative jitter applied to every copy duration (uniform in +/- jitter).
    pub jitter: f64,
    /// Probability that a copy stalls.
    pub outlier_rate: f64,
    /// Duration multiplier for stalled copies.
    pub outlier_factor: f64,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period: f32,
    /// Block the submitting thread for the modeled duration so CPU timings
    /// track the virtual GPU clock.
    pub realtime: bool,
    /// Multiplier on real-time pacing.
    pub time_scale: f64,
    /// Fixed virtual cost of one copy command.
    pub copy_overhead_ns: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            jitter: DEFAULT_JITTER,
            outlier_rate: DEFAULT_OUTLIER_RATE,
            outlier_factor: DEFAULT_OUTLIER_FACTOR,
            timestamp_period: 1.0,
            realtime: false,
            time_scale: 1.0,
            copy_overhead_ns: DEFAULT_COPY_OVERHEAD_NS,
        }
    }
}

impl SimConfig {
    /// Fixed seed for reproducible noise.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_outliers(mut self, rate: f64, factor: f64) -> Self {
        self.outlier_rate = rate;
        self.outlier_factor = factor;
        self
    }

    pub fn with_timestamp_period(mut self, period: f32) -> Self {
        self.timestamp_period = period;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }

    /// Deterministic device: no jitter, no stalls.
    pub fn quiet(self) -> Self {
        self.with_jitter(0.0).with_outliers(0.0, 1.0)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `DeviceError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> DeviceResult<()> {
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(DeviceError::InvalidConfig(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        if !(0.0..=1.0).contains(&self.outlier_rate) {
            return Err(DeviceError::InvalidConfig(format!(
                "outlier_rate must be in [0, 1], got {}",
                self.outlier_rate
            )));
        }
        if !self.outlier_factor.is_finite() || self.outlier_factor < 1.0 {
            return Err(DeviceError::InvalidConfig(format!(
                "outlier_factor must be >= 1, got {}",
                self.outlier_factor
            )));
        }
        if !self.timestamp_period.is_finite() || self.timestamp_period <= 0.0 {
            return Err(DeviceError::InvalidConfig(format!(
                "timestamp_period must be positive, got {}",
                self.timestamp_period
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(DeviceError::InvalidConfig(format!(
                "time_scale must be non-negative, got {}",
                self.time_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_build_valid_layouts() {
        for preset in SimPreset::ALL {
            let layout = preset.layout().unwrap();
            assert!(!layout.types().is_empty());
            assert!(layout
                .find_first_memtype_supports(
                    MemoryPropertyFlags::DEVICE_LOCAL,
                    layout.all_types_filter(),
                    false
                )
                .is_some());
        }
        println!("[PASS] Every preset exposes a device-local type");
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert!(SimConfig::default().validate().is_ok());
        assert!(SimConfig::default().with_jitter(1.5).validate().is_err());
        assert!(SimConfig::default().with_outliers(2.0, 8.0).validate().is_err());
        assert!(SimConfig::default().with_outliers(0.1, 0.5).validate().is_err());
        assert!(SimConfig::default().with_timestamp_period(0.0).validate().is_err());
        assert!(SimConfig::default().with_time_scale(-1.0).validate().is_err());
    }

    #[test]
    fn test_config_json_defaults_missing_fields() {
        let config: SimConfig = serde_json::from_str(r#"{"seed": 7, "realtime": true}"#).unwrap();
        assert_eq!(config.seed, Some(7));
        assert!(config.realtime);
        assert_eq!(config.jitter, DEFAULT_JITTER);
    }
}
