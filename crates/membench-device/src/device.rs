//! The device trait consumed by the benchmark engine.

use std::fmt;

use serde::Serialize;

use crate::command::{CommandBuffer, CommandBufferId, QueryPoolId};
use crate::error::DeviceResult;
use crate::memory::MemoryLayout;
use crate::resource::{Allocation, BufferDesc, ImageDesc, ResourceId};

/// Static properties of an opened device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Index the device was opened with.
    pub index: u32,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period: f32,
    /// Largest single allocation the device accepts, in bytes.
    pub max_allocation_size: u64,
    /// Largest width or height of a 2D image.
    pub max_image_dimension: u32,
    /// Heaps and memory types.
    pub memory: MemoryLayout,
}

/// A GPU with one transfer-capable queue.
///
/// All methods take `&self`; implementations synchronize internally. Every
/// submission is synchronous: when [`submit_and_wait`](Self::submit_and_wait)
/// returns, the work and its timestamp writes are complete.
///
/// # Object Safety
///
/// The trait is object safe; the engine holds an `Arc<dyn GpuDevice>`.
pub trait GpuDevice: Send + Sync + fmt::Debug {
    /// Device properties, read once at open.
    fn info(&self) -> &DeviceInfo;

    /// Memory layout shortcut.
    fn memory_layout(&self) -> &MemoryLayout {
        &self.info().memory
    }

    /// Create a buffer.
    ///
    /// # Errors
    ///
    /// - `MemoryTypeNotFound` when no eligible type matches the selector
    /// - `AllocationTooLarge` / `OutOfDeviceMemory` when the heap cannot hold it
    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<Allocation>;

    /// Create an image. Optimal-tiled images may be restricted to a subset of
    /// memory types.
    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<Allocation>;

    /// Destroy a buffer or image and release its memory.
    fn destroy_resource(&self, id: ResourceId) -> DeviceResult<()>;

    /// Upload host data into a resource at `offset`.
    fn write(&self, id: ResourceId, offset: u64, data: &[u8]) -> DeviceResult<()>;

    /// CPU memcpy of `size` bytes between two host-visible resources.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when either side is not host-visible.
    fn host_copy(&self, src: ResourceId, dst: ResourceId, size: u64) -> DeviceResult<()>;

    /// Start recording a command buffer. `label` shows up in logs.
    fn begin_command_buffer(&self, label: &str) -> DeviceResult<CommandBuffer>;

    /// Submit a command buffer to the queue and block until it completes.
    fn submit_and_wait(&self, cmd: CommandBuffer) -> DeviceResult<()>;

    /// True once the command buffer has been submitted and waited on.
    fn is_complete(&self, id: CommandBufferId) -> bool;

    /// Create a timestamp query pool with `capacity` slots.
    fn create_query_pool(&self, capacity: u32) -> DeviceResult<QueryPoolId>;

    /// Destroy a timestamp query pool.
    fn destroy_query_pool(&self, pool: QueryPoolId) -> DeviceResult<()>;

    /// Raw 64-bit tick values of `count` slots starting at `first`.
    ///
    /// Blocks until the results are available.
    ///
    /// # Errors
    ///
    /// `QueryNotReady` when a slot was never written since its last reset.
    fn get_query_results(&self, pool: QueryPoolId, first: u32, count: u32)
        -> DeviceResult<Vec<u64>>;
}
