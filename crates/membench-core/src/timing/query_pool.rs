//! Fixed-capacity timestamp query pool.

use std::sync::Arc;

use membench_device::{CommandBuffer, CommandBufferId, GpuDevice, PipelineStage, QueryPoolId};
use tracing::error;

use crate::constants::QUERY_POOL_CAPACITY;
use crate::error::BenchResult;

/// A written timestamp slot, tagged with the reset epoch it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySlot {
    pub index: u32,
    pub epoch: u64,
}

/// Timestamp query pool with a small fixed number of slots.
///
/// `reset` must be recorded before any `write_timestamp` in the same command
/// buffer. Every reset starts a new epoch so stale read-backs are caught.
///
/// # Drop Behavior
///
/// Destroys the device pool on drop. NEVER panics - logs errors instead.
#[derive(Debug)]
pub struct QueryPool {
    device: Arc<dyn GpuDevice>,
    id: QueryPoolId,
    capacity: u32,
    next_slot: u32,
    epoch: u64,
    recording_in: Option<CommandBufferId>,
}

impl QueryPool {
    /// Create a pool with one begin and one end slot.
    pub fn new(device: Arc<dyn GpuDevice>) -> BenchResult<Self> {
        Self::with_capacity(device, QUERY_POOL_CAPACITY)
    }

    pub fn with_capacity(device: Arc<dyn GpuDevice>, capacity: u32) -> BenchResult<Self> {
        let id = device.create_query_pool(capacity)?;
        Ok(Self {
            device,
            id,
            capacity,
            next_slot: 0,
            epoch: 0,
            recording_in: None,
        })
    }

    pub fn id(&self) -> QueryPoolId {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current reset epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// Record a reset of the whole pool into `cmd` and start a new epoch.
    pub fn reset(&mut self, cmd: &mut CommandBuffer) {
        cmd.reset_queries(self.id, 0, self.capacity);
        self.next_slot = 0;
        self.epoch += 1;
        self.recording_in = Some(cmd.id());
    }

    /// Record a timestamp write into the next free slot.
    ///
    /// # Panics
    ///
    /// - No `reset` was recorded into `cmd` first
    /// - Every slot has been written since the last reset
    pub fn write_timestamp(&mut self, cmd: &mut CommandBuffer, stage: PipelineStage) -> QuerySlot {
        assert_eq!(
            self.recording_in,
            Some(cmd.id()),
            "query pool must be reset in {} before writing timestamps",
            cmd.id()
        );
        assert!(
            self.next_slot < self.capacity,
            "query pool overrun: all {} slots written since the last reset",
            self.capacity
        );
        let index = self.next_slot;
        self.next_slot += 1;
        cmd.write_timestamp(self.id, index, stage);
        QuerySlot {
            index,
            epoch: self.epoch,
        }
    }

    /// True when `id` has been submitted and waited on.
    pub fn is_complete(&self, id: CommandBufferId) -> bool {
        self.device.is_complete(id)
    }

    /// Blocking read-back of raw tick values for `first..=last`.
    ///
    /// # Panics
    ///
    /// When either slot belongs to an epoch other than the current one.
    pub fn read_ticks(&self, first: QuerySlot, last: QuerySlot) -> BenchResult<Vec<u64>> {
        assert!(
            first.epoch == self.epoch && last.epoch == self.epoch,
            "stale query read: slots from epoch {}/{} but pool is at epoch {}",
            first.epoch,
            last.epoch,
            self.epoch
        );
        assert!(first.index <= last.index, "query slots out of order");
        let ticks = self
            .device
            .get_query_results(self.id, first.index, last.index - first.index + 1)?;
        Ok(ticks)
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_query_pool(self.id) {
            error!("failed to destroy {}: {}", self.id, e);
        }
    }
}
