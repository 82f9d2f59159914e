//! Size sweep and destination resolution.

use membench_device::{DeviceError, MemoryLayout, MemoryPropertyFlags};
use tracing::debug;

use crate::error::BenchResult;

/// Sizes from `min` to `max` in `steps` equal intervals.
///
/// One size when `max <= min`; the last size may fall short of `max` by the
/// integer-division remainder.
pub fn sweep_sizes(min: u64, max: u64, steps: usize) -> Vec<u64> {
    if max <= min {
        return vec![max];
    }
    let steps = steps.max(1) as u64;
    let interval = (max - min) / steps;
    if interval == 0 {
        return vec![min, max];
    }
    (0..=steps).map(|i| min + i * interval).collect()
}

/// Clamp every size to `cap`, then drop consecutive duplicates.
pub fn clamp_sizes(sizes: &[u64], cap: u64) -> Vec<u64> {
    let mut clamped: Vec<u64> = sizes.iter().map(|&size| size.min(cap)).collect();
    clamped.dedup();
    clamped
}

/// Resolve destination flag candidates to memory type indices, dropping
/// candidates that land on an index already taken.
///
/// # Errors
///
/// `MemoryTypeNotFound` when a candidate matches no memory type.
pub fn resolve_destinations(
    layout: &MemoryLayout,
    candidates: &[MemoryPropertyFlags],
) -> BenchResult<Vec<u32>> {
    let filter = layout.all_types_filter();
    let mut types: Vec<u32> = Vec::with_capacity(candidates.len());
    for &flags in candidates {
        let index = layout
            .find_first_memtype_supports(flags, filter, false)
            .ok_or(DeviceError::MemoryTypeNotFound { flags, filter })?;
        if types.contains(&index) {
            debug!("destination {} duplicates memory type {}, skipped", flags, index);
            continue;
        }
        debug!("destination {} -> memory type {}", flags, index);
        types.push(index);
    }
    Ok(types)
}
