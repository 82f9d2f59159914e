//! Copy-duration model of the simulated device.
//!
//! Durations are derived from a per-location bandwidth table. Rates are in
//! decimal GB/s, which conveniently equals bytes per nanosecond.

use crate::memory::{MemoryLayout, MemoryPropertyFlags};
use crate::resource::ImageTiling;

/// Where a memory type physically lives, as far as transfer cost goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device memory without host access.
    Vram,
    /// Host-mapped window into device memory.
    VramHostVisible,
    /// System memory, write-combined.
    HostCoherent,
    /// System memory, CPU-cached.
    HostCached,
}

impl MemoryLocation {
    pub fn of(flags: MemoryPropertyFlags) -> Self {
        match (flags.is_device_local(), flags.is_host_visible()) {
            (true, false) => Self::Vram,
            (true, true) => Self::VramHostVisible,
            _ if flags.contains(MemoryPropertyFlags::HOST_CACHED) => Self::HostCached,
            _ => Self::HostCoherent,
        }
    }
}

/// Shared-memory bandwidth used when every heap is device-local.
const UNIFIED_GBPS: f64 = 60.0;
/// CPU memcpy bandwidth between host-visible allocations.
const HOST_MEMCPY_GBPS: f64 = 9.0;

/// Bandwidth table for one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthModel {
    unified: bool,
}

impl BandwidthModel {
    /// Pick the model matching a memory layout: unified when every heap is
    /// device-local, discrete otherwise.
    pub fn for_layout(layout: &MemoryLayout) -> Self {
        Self {
            unified: layout.heaps().iter().all(|heap| heap.device_local),
        }
    }

    pub fn is_unified(&self) -> bool {
        self.unified
    }

    /// GPU copy bandwidth from `src` to `dst` in GB/s.
    pub fn copy_gbps(&self, src: MemoryLocation, dst: MemoryLocation) -> f64 {
        use MemoryLocation::*;
        if self.unified {
            return match (src, dst) {
                (HostCached, _) | (_, HostCached) => UNIFIED_GBPS * 0.85,
                _ => UNIFIED_GBPS,
            };
        }
        match (src, dst) {
            (Vram, Vram) => 450.0,
            (Vram, VramHostVisible) | (VramHostVisible, Vram) => 400.0,
            (VramHostVisible, VramHostVisible) => 380.0,
            (Vram | VramHostVisible, HostCoherent) => 24.0,
            (Vram | VramHostVisible, HostCached) => 22.0,
            (HostCoherent, Vram | VramHostVisible) => 25.0,
            (HostCached, Vram | VramHostVisible) => 24.0,
            (HostCoherent | HostCached, HostCoherent | HostCached) => 12.0,
        }
    }

    /// CPU memcpy bandwidth in GB/s.
    pub fn host_copy_gbps(&self) -> f64 {
        HOST_MEMCPY_GBPS
    }

    /// Relative efficiency of an image endpoint.
    pub fn tiling_factor(&self, tiling: ImageTiling) -> f64 {
        match tiling {
            ImageTiling::Optimal => 0.92,
            ImageTiling::Linear => 0.75,
        }
    }

    /// Modeled copy duration in nanoseconds, before noise.
    pub fn copy_ns(&self, bytes: u64, gbps: f64, overhead_ns: u64) -> f64 {
        overhead_ns as f64 + bytes as f64 / gbps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPreset;

    #[test]
    fn test_location_from_flags() {
        let dl = MemoryPropertyFlags::DEVICE_LOCAL;
        let hv = MemoryPropertyFlags::HOST_VISIBLE;
        let hco = MemoryPropertyFlags::HOST_COHERENT;
        let hca = MemoryPropertyFlags::HOST_CACHED;
        assert_eq!(MemoryLocation::of(dl), MemoryLocation::Vram);
        assert_eq!(MemoryLocation::of(dl | hv | hco), MemoryLocation::VramHostVisible);
        assert_eq!(MemoryLocation::of(hv | hco), MemoryLocation::HostCoherent);
        assert_eq!(MemoryLocation::of(hv | hco | hca), MemoryLocation::HostCached);
    }

    #[test]
    fn test_discrete_device_local_is_fastest() {
        let model = BandwidthModel::for_layout(&SimPreset::Discrete.layout().unwrap());
        assert!(!model.is_unified());
        let vram = model.copy_gbps(MemoryLocation::Vram, MemoryLocation::Vram);
        let pcie = model.copy_gbps(MemoryLocation::Vram, MemoryLocation::HostCoherent);
        assert!(vram > 10.0 * pcie);
        println!("[PASS] VRAM-to-VRAM beats PCIe by an order of magnitude");
    }

    #[test]
    fn test_integrated_is_unified() {
        let model = BandwidthModel::for_layout(&SimPreset::Integrated.layout().unwrap());
        assert!(model.is_unified());
        assert_eq!(
            model.copy_gbps(MemoryLocation::Vram, MemoryLocation::VramHostVisible),
            UNIFIED_GBPS
        );
    }

    #[test]
    fn test_copy_ns_scales_with_bytes() {
        let model = BandwidthModel { unified: false };
        assert_eq!(model.copy_ns(1_000_000, 10.0, 0), 100_000.0);
        assert_eq!(model.copy_ns(0, 10.0, 2_000), 2_000.0);
    }
}
