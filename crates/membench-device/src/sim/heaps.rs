//! Per-heap allocation accounting for the simulated device.

use crate::error::{DeviceError, DeviceResult};
use crate::memory::MemoryLayout;

/// Tracks bytes in use on each heap.
#[derive(Debug)]
pub struct HeapTracker {
    capacity: Vec<u64>,
    used: Vec<u64>,
    peak: Vec<u64>,
}

impl HeapTracker {
    pub fn new(layout: &MemoryLayout) -> Self {
        let capacity: Vec<u64> = layout.heaps().iter().map(|heap| heap.size).collect();
        let count = capacity.len();
        Self {
            capacity,
            used: vec![0; count],
            peak: vec![0; count],
        }
    }

    /// Charge `bytes` against `heap`.
    ///
    /// # Errors
    ///
    /// `OutOfDeviceMemory` when the heap cannot hold the allocation.
    pub fn allocate(&mut self, heap: u32, bytes: u64) -> DeviceResult<()> {
        let available = self.available(heap)?;
        if bytes > available {
            return Err(DeviceError::OutOfDeviceMemory {
                heap,
                requested: bytes,
                available,
            });
        }
        let index = heap as usize;
        self.used[index] += bytes;
        self.peak[index] = self.peak[index].max(self.used[index]);

        tracing::debug!(
            "heap {} allocated {} bytes ({:.1}% used)",
            heap,
            bytes,
            self.utilization_percent(heap)
        );
        Ok(())
    }

    /// Return `bytes` to `heap`.
    pub fn release(&mut self, heap: u32, bytes: u64) {
        if let Some(used) = self.used.get_mut(heap as usize) {
            *used = used.saturating_sub(bytes);
        }
    }

    pub fn available(&self, heap: u32) -> DeviceResult<u64> {
        let index = heap as usize;
        match (self.capacity.get(index), self.used.get(index)) {
            (Some(capacity), Some(used)) => Ok(capacity.saturating_sub(*used)),
            _ => Err(DeviceError::HeapOutOfRange {
                index: heap,
                count: self.capacity.len(),
            }),
        }
    }

    pub fn used(&self, heap: u32) -> u64 {
        self.used.get(heap as usize).copied().unwrap_or(0)
    }

    pub fn peak(&self, heap: u32) -> u64 {
        self.peak.get(heap as usize).copied().unwrap_or(0)
    }

    fn utilization_percent(&self, heap: u32) -> f64 {
        match self.capacity.get(heap as usize) {
            Some(&capacity) if capacity > 0 => self.used(heap) as f64 / capacity as f64 * 100.0,
            _ => 0.0,
        }
    }
}
