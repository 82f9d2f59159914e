//! Robust throughput statistics.
//!
//! Per channel (CPU, GPU) every sample becomes a speed
//! `bytes / time_ns * 1e9 / unit_bytes`; the estimate is the median speed and
//! the robust coefficient of variation `1.4826 * MAD / median`.
//!
//! | Input | Median | CoV |
//! |-------|--------|-----|
//! | all zero | 0 | 0 |
//! | median zero, some non-zero | 0 | +inf |
//! | empty, negative or non-finite | error | error |

use serde::{Deserialize, Serialize};

use crate::config::SpeedUnit;
use crate::constants::MAD_TO_SIGMA;
use crate::error::{BenchError, BenchResult};
use crate::timing::TimingSample;

/// Median of `values`, reordering the slice in place.
///
/// Odd lengths take the middle order statistic; even lengths average the two
/// middle ones. Uses partial selection, not a full sort.
///
/// # Panics
///
/// On an empty slice.
pub fn median_of(values: &mut [f64]) -> f64 {
    assert!(!values.is_empty(), "median of an empty slice");
    let n = values.len();
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (below + upper) / 2.0
    }
}

/// Median and robust coefficient of variation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThroughputEstimate {
    /// Median speed in the run's unit.
    pub median: f64,
    /// `1.4826 * MAD / median`; +inf when the median is zero but not every
    /// speed is.
    pub cov: f64,
}

impl ThroughputEstimate {
    /// Reduce a list of speeds.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty list or any negative or non-finite speed.
    pub fn from_speeds(speeds: &[f64]) -> BenchResult<Self> {
        if speeds.is_empty() {
            return Err(BenchError::InvalidArgument(
                "no speeds to reduce".to_string(),
            ));
        }
        if let Some(bad) = speeds.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(BenchError::InvalidArgument(format!(
                "speed must be finite and non-negative, got {}",
                bad
            )));
        }

        let mut scratch = speeds.to_vec();
        let median = median_of(&mut scratch);
        if median == 0.0 {
            let cov = if speeds.iter().all(|&s| s == 0.0) {
                0.0
            } else {
                f64::INFINITY
            };
            return Ok(Self { median, cov });
        }

        for (deviation, &speed) in scratch.iter_mut().zip(speeds) {
            *deviation = (speed - median).abs();
        }
        let mad = median_of(&mut scratch);
        Ok(Self {
            median,
            cov: MAD_TO_SIGMA * mad / median,
        })
    }

    /// CoV as a percentage.
    pub fn cov_percent(&self) -> f64 {
        self.cov * 100.0
    }
}

/// Speed of one transfer. Absent or zero time gives 0.
pub fn speed(bytes: u64, time_ns: Option<u64>, unit: SpeedUnit) -> f64 {
    match time_ns {
        Some(ns) if ns > 0 => bytes as f64 / ns as f64 * 1e9 / unit.bytes(),
        _ => 0.0,
    }
}

/// CPU and GPU estimates of one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelEstimates {
    pub cpu: ThroughputEstimate,
    pub gpu: ThroughputEstimate,
}

impl ChannelEstimates {
    /// Reduce the samples of one cell, each having moved `bytes`.
    pub fn from_samples(
        bytes: u64,
        samples: &[TimingSample],
        unit: SpeedUnit,
    ) -> BenchResult<Self> {
        let cpu: Vec<f64> = samples
            .iter()
            .map(|s| speed(bytes, Some(s.cpu_ns), unit))
            .collect();
        let gpu: Vec<f64> = samples
            .iter()
            .map(|s| speed(bytes, s.gpu_ns(), unit))
            .collect();
        Ok(Self {
            cpu: ThroughputEstimate::from_speeds(&cpu)?,
            gpu: ThroughputEstimate::from_speeds(&gpu)?,
        })
    }
}
