//! Heap-capacity planning.
//!
//! Given where the source group lives, how many elements it has, and which
//! destination memory types a test will use, the planner computes the largest
//! single resource size that keeps every heap under its headroom fraction.
//!
//! ```text
//! demand(heap)    = source count (if the source is on heap) + destinations on heap
//! available(heap) = capacity(heap) * headroom
//! allowance(heap) = available(heap) / demand(heap)
//! cap             = min(requested, min allowance, max allocation size)
//! ```
//!
//! Each destination candidate counts as one unit regardless of its size.

use std::collections::BTreeMap;

use membench_device::MemoryLayout;
use serde::Serialize;
use tracing::{debug, info};

use crate::constants::{HEAP_HEADROOM_FRACTION, PLAN_GRANULARITY};
use crate::error::{BenchError, BenchResult};

/// Where the source group lives and how many elements it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFootprint {
    pub heap_index: u32,
    pub element_count: u32,
}

/// Planner bookkeeping for one heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapDemand {
    /// Heap capacity in bytes.
    pub capacity: u64,
    /// Allocations that will be live on the heap at once.
    pub units: u32,
    /// Bytes usable after headroom.
    pub available: u64,
    /// Bytes per allocation.
    pub allowance: u64,
}

/// Per-heap demand for one test configuration. Heaps without demand are
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeapUsagePlan {
    heaps: BTreeMap<u32, HeapDemand>,
}

impl HeapUsagePlan {
    pub fn get(&self, heap_index: u32) -> Option<&HeapDemand> {
        self.heaps.get(&heap_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &HeapDemand)> {
        self.heaps.iter().map(|(heap, demand)| (*heap, demand))
    }

    pub fn len(&self) -> usize {
        self.heaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heaps.is_empty()
    }

    /// Heap with the smallest allowance.
    pub fn tightest(&self) -> Option<(u32, &HeapDemand)> {
        self.iter().min_by_key(|(_, demand)| demand.allowance)
    }
}

/// Planner output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityPlan {
    /// Size asked for.
    pub requested: u64,
    /// Largest safe size, never above `requested`.
    pub cap: u64,
    pub usage: HeapUsagePlan,
}

impl CapacityPlan {
    pub fn is_shrunk(&self) -> bool {
        self.cap < self.requested
    }
}

/// Computes safe test sizes from a device memory layout.
#[derive(Debug, Clone)]
pub struct HeapCapacityPlanner<'a> {
    layout: &'a MemoryLayout,
    headroom: f64,
    max_allocation_size: u64,
}

impl<'a> HeapCapacityPlanner<'a> {
    pub fn new(layout: &'a MemoryLayout, max_allocation_size: u64) -> Self {
        Self {
            layout,
            headroom: HEAP_HEADROOM_FRACTION,
            max_allocation_size,
        }
    }

    /// Fraction of each heap that may be filled, default 0.80.
    pub fn with_headroom(mut self, headroom: f64) -> Self {
        self.headroom = headroom;
        self
    }

    /// Count allocations per heap.
    ///
    /// # Errors
    ///
    /// Device errors for unknown heap or memory type indices.
    pub fn demand(
        &self,
        source: SourceFootprint,
        destination_types: &[u32],
    ) -> BenchResult<HeapUsagePlan> {
        let mut units: BTreeMap<u32, u32> = BTreeMap::new();
        self.layout.heap(source.heap_index)?;
        if source.element_count > 0 {
            *units.entry(source.heap_index).or_default() += source.element_count;
        }
        for &memory_type in destination_types {
            let heap = self.layout.heap_of_type(memory_type)?;
            *units.entry(heap).or_default() += 1;
        }

        let mut heaps = BTreeMap::new();
        for (heap_index, units) in units {
            let capacity = self.layout.heap(heap_index)?.size;
            let available = (capacity as f64 * self.headroom).floor() as u64;
            heaps.insert(
                heap_index,
                HeapDemand {
                    capacity,
                    units,
                    available,
                    allowance: available / u64::from(units),
                },
            );
        }
        Ok(HeapUsagePlan { heaps })
    }

    /// Largest resource size not above `requested` that fits every heap.
    ///
    /// The cap is rounded down to a 4 KiB multiple unless it equals
    /// `requested`.
    ///
    /// # Errors
    ///
    /// `InsufficientHeap` when some heap cannot hold even one 4 KiB page per
    /// allocation.
    pub fn plan(
        &self,
        source: SourceFootprint,
        destination_types: &[u32],
        requested: u64,
    ) -> BenchResult<CapacityPlan> {
        let usage = self.demand(source, destination_types)?;
        let mut cap = requested.min(self.max_allocation_size);
        for (_, demand) in usage.iter() {
            cap = cap.min(demand.allowance);
        }
        if cap < requested {
            cap -= cap % PLAN_GRANULARITY;
        }
        if cap == 0 {
            let (heap, demand) = usage
                .tightest()
                .map(|(heap, demand)| (heap, *demand))
                .unwrap_or((source.heap_index, HeapDemand {
                    capacity: 0,
                    units: 0,
                    available: 0,
                    allowance: 0,
                }));
            return Err(BenchError::InsufficientHeap {
                heap,
                available: demand.available,
                units: demand.units,
            });
        }

        for (heap, demand) in usage.iter() {
            debug!(
                "heap {}: {} units, {} of {} bytes usable, {} bytes each",
                heap, demand.units, demand.available, demand.capacity, demand.allowance
            );
        }
        let plan = CapacityPlan {
            requested,
            cap,
            usage,
        };
        if plan.is_shrunk() {
            info!(
                "test size reduced from {} to {} bytes to stay within {:.0}% of heap capacity",
                requested,
                cap,
                self.headroom * 100.0
            );
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membench_device::{MemoryHeap, MemoryPropertyFlags, MemoryType};

    use crate::constants::{GIB, MIB};

    fn layout(device_heap: u64, host_heap: u64) -> MemoryLayout {
        let dl = MemoryPropertyFlags::DEVICE_LOCAL;
        let hv = MemoryPropertyFlags::HOST_VISIBLE;
        MemoryLayout::new(
            vec![
                MemoryHeap { size: device_heap, device_local: true },
                MemoryHeap { size: host_heap, device_local: false },
            ],
            vec![
                MemoryType { flags: dl, heap_index: 0 },
                MemoryType { flags: hv | MemoryPropertyFlags::HOST_COHERENT, heap_index: 1 },
                MemoryType { flags: hv | MemoryPropertyFlags::HOST_CACHED, heap_index: 1 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_no_shrink_when_heaps_are_roomy() {
        let layout = layout(8 * GIB, 16 * GIB);
        let planner = HeapCapacityPlanner::new(&layout, 4 * GIB);
        let source = SourceFootprint { heap_index: 0, element_count: 10 };
        let plan = planner.plan(source, &[0, 1, 2], 256 * MIB).unwrap();
        assert_eq!(plan.cap, 256 * MIB);
        assert!(!plan.is_shrunk());

        let device = plan.usage.get(0).unwrap();
        assert_eq!(device.units, 11);
        let host = plan.usage.get(1).unwrap();
        assert_eq!(host.units, 2);
        println!("[PASS] Roomy heaps keep the requested size");
    }

    #[test]
    fn test_shrinks_on_small_heap() {
        let layout = layout(GIB, 16 * GIB);
        let planner = HeapCapacityPlanner::new(&layout, 4 * GIB);
        let source = SourceFootprint { heap_index: 0, element_count: 10 };
        let destinations = [0, 1, 2];
        let plan = planner.plan(source, &destinations, 256 * MIB).unwrap();

        assert!(plan.is_shrunk());
        assert_eq!(plan.cap % PLAN_GRANULARITY, 0);
        // Source plus the one device-local destination share heap 0.
        let device = plan.usage.get(0).unwrap();
        assert_eq!(device.units, 11);
        assert!(plan.cap * u64::from(device.units) <= (0.8 * GIB as f64) as u64);
        assert_eq!(plan.usage.tightest().map(|(heap, _)| heap), Some(0));
        println!("[PASS] 1 GiB heap shrinks 256 MiB to {} bytes", plan.cap);
    }

    #[test]
    fn test_every_candidate_on_source_heap() {
        // Integrated-style: all types share heap 0.
        let layout = MemoryLayout::new(
            vec![MemoryHeap { size: GIB, device_local: true }],
            vec![
                MemoryType { flags: MemoryPropertyFlags::DEVICE_LOCAL, heap_index: 0 },
                MemoryType {
                    flags: MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE,
                    heap_index: 0,
                },
            ],
        )
        .unwrap();
        let planner = HeapCapacityPlanner::new(&layout, 4 * GIB);
        let source = SourceFootprint { heap_index: 0, element_count: 10 };
        let plan = planner.plan(source, &[0, 1, 1], 256 * MIB).unwrap();
        assert_eq!(plan.usage.get(0).unwrap().units, 13);
        assert!(plan.cap * 13 <= (0.8 * GIB as f64) as u64);
    }

    #[test]
    fn test_monotonic_in_group_size_and_candidates() {
        let layout = layout(2 * GIB, 4 * GIB);
        let planner = HeapCapacityPlanner::new(&layout, 4 * GIB);
        let mut previous = u64::MAX;
        for count in 1..=32 {
            let source = SourceFootprint { heap_index: 0, element_count: count };
            let cap = planner.plan(source, &[0, 1], GIB).unwrap().cap;
            assert!(cap <= previous, "cap grew from {} to {} at count {}", previous, cap, count);
            previous = cap;
        }

        let source = SourceFootprint { heap_index: 0, element_count: 4 };
        let mut candidates = Vec::new();
        let mut previous = u64::MAX;
        for next in [0u32, 1, 2, 0, 0, 1] {
            candidates.push(next);
            let cap = planner.plan(source, &candidates, GIB).unwrap().cap;
            assert!(cap <= previous);
            previous = cap;
        }
        println!("[PASS] Cap never grows with more demand");
    }

    #[test]
    fn test_max_allocation_size_caps() {
        let layout = layout(64 * GIB, 64 * GIB);
        let planner = HeapCapacityPlanner::new(&layout, 512 * MIB);
        let source = SourceFootprint { heap_index: 0, element_count: 1 };
        let plan = planner.plan(source, &[0], 2 * GIB).unwrap();
        assert_eq!(plan.cap, 512 * MIB);
        assert!(plan.is_shrunk());
    }

    #[test]
    fn test_hopeless_heap_errors() {
        let layout = layout(16 * 1024, 16 * GIB);
        let planner = HeapCapacityPlanner::new(&layout, 4 * GIB);
        let source = SourceFootprint { heap_index: 0, element_count: 10 };
        assert!(matches!(
            planner.plan(source, &[0], 256 * MIB),
            Err(BenchError::InsufficientHeap { heap: 0, units: 11, .. })
        ));
    }

    #[test]
    fn test_unknown_type_errors() {
        let layout = layout(GIB, GIB);
        let planner = HeapCapacityPlanner::new(&layout, GIB);
        let source = SourceFootprint { heap_index: 0, element_count: 1 };
        assert!(matches!(
            planner.plan(source, &[9], MIB),
            Err(BenchError::Device(_))
        ));
    }
}
