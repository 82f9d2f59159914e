//! Explicit per-run state: device handle, query pool and seed stream.

use std::sync::Arc;

use membench_device::{DeviceInfo, GpuDevice, MemoryLayout};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::error::BenchResult;
use crate::timing::QueryPool;

/// Everything a measurement needs besides its resources.
///
/// One context per device; passed by `&mut` so no global state is involved.
#[derive(Debug)]
pub struct BenchContext {
    device: Arc<dyn GpuDevice>,
    queries: QueryPool,
    rng: ChaCha8Rng,
}

impl BenchContext {
    /// Bind a device. `seed` fixes resource picking and noise content.
    pub fn new(device: Arc<dyn GpuDevice>, seed: Option<u64>) -> BenchResult<Self> {
        let queries = QueryPool::new(device.clone())?;
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let info = device.info();
        info!(
            "using device {} '{}' (timestamp period {} ns, max allocation {} bytes)",
            info.index, info.name, info.timestamp_period, info.max_allocation_size
        );
        Ok(Self {
            device,
            queries,
            rng,
        })
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    pub fn info(&self) -> &DeviceInfo {
        self.device.info()
    }

    pub fn layout(&self) -> &MemoryLayout {
        self.device.memory_layout()
    }

    pub fn timestamp_period(&self) -> f32 {
        self.device.info().timestamp_period
    }

    pub fn queries(&self) -> &QueryPool {
        &self.queries
    }

    pub fn queries_mut(&mut self) -> &mut QueryPool {
        &mut self.queries
    }

    /// Derive a seed for a child RNG (resource groups, noise fills).
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }
}
