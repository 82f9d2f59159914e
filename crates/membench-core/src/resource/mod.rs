//! GPU resources owned by the benchmark: buffers, images and groups of them.
//!
//! | Type | Role |
//! |------|------|
//! | [`Buffer`] | Linear allocation, RAII over a device handle |
//! | [`Image`] | Square 2D image, optimal or linear tiling |
//! | [`ResourceGroup`] | N identical resources cycled by random pick |
//!
//! Copies go through [`CopyFrom`]. Passing `None` for the command buffer runs
//! a self-contained timed submission; passing `Some` only records the copy.

mod buffer;
mod copy;
mod group;
mod image;
mod noise;

use std::sync::Arc;

use membench_device::{
    Allocation, CommandBuffer, DeviceInfo, GpuDevice, ImageTiling, MemoryPropertyFlags,
    MemorySelector, ResourceId,
};

pub use buffer::Buffer;
pub use copy::CopyReport;
pub use group::ResourceGroup;
pub use image::{square_extent, Image, IMAGE_FORMAT};
pub use noise::write_noise;

use crate::context::BenchContext;
use crate::error::BenchResult;

/// Common view of a device-backed resource.
pub trait Resource {
    fn device(&self) -> &Arc<dyn GpuDevice>;

    fn allocation(&self) -> &Allocation;

    fn id(&self) -> ResourceId {
        self.allocation().id
    }

    /// Size in bytes (pixel data for images).
    fn size(&self) -> u64 {
        self.allocation().size
    }

    fn memory_type_index(&self) -> u32 {
        self.allocation().memory_type_index
    }

    fn memory_flags(&self) -> MemoryPropertyFlags {
        self.allocation().memory_flags
    }

    fn heap_index(&self) -> u32 {
        self.allocation().heap_index
    }

    /// Size label for reports, e.g. `256.0 MB` or `4096x4096 (256.0 MB)`.
    fn describe(&self) -> String;

    /// Upload host bytes at `offset`.
    fn write(&self, offset: u64, data: &[u8]) -> BenchResult<()> {
        self.device().write(self.id(), offset, data)?;
        Ok(())
    }
}

/// Resources the test matrix can allocate from a byte budget.
pub trait Allocate: Resource + Sized {
    /// Bytes actually occupied when asked for `bytes`.
    fn footprint(bytes: u64, info: &DeviceInfo) -> u64;

    /// Create a transfer source/destination of roughly `bytes`.
    ///
    /// `tiling` only applies to images.
    fn allocate(
        device: &Arc<dyn GpuDevice>,
        bytes: u64,
        memory: MemorySelector,
        tiling: ImageTiling,
    ) -> BenchResult<Self>;
}

/// Copy into `self` from a resource of type `S`.
pub trait CopyFrom<S: Resource>: Resource {
    /// Copy from `src`.
    ///
    /// With `cmd == None` the copy is submitted on its own, timed, and the
    /// report carries a sample. With `Some(cmd)` the copy is only recorded
    /// and the report has no sample.
    fn copy_from(
        &self,
        ctx: &mut BenchContext,
        src: &S,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport>;
}
