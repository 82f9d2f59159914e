//! Linear buffer resource.

use std::sync::Arc;

use membench_device::{
    human_readable_size, Allocation, BufferDesc, BufferUsage, Command, CommandBuffer, DeviceInfo,
    Extent2D, GpuDevice, ImageTiling, MemorySelector,
};
use tracing::error;

use super::copy::{self, CopyReport};
use super::image::Image;
use super::{Allocate, CopyFrom, Resource};
use crate::context::BenchContext;
use crate::error::{BenchError, BenchResult};

/// A device buffer, destroyed on drop.
///
/// # Drop Behavior
///
/// Calls `destroy_resource` on drop. NEVER panics - logs errors instead.
#[derive(Debug)]
pub struct Buffer {
    device: Arc<dyn GpuDevice>,
    alloc: Allocation,
    usage: BufferUsage,
}

impl Buffer {
    /// Create a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Device errors such as `MemoryTypeNotFound` or `OutOfDeviceMemory`.
    pub fn new(
        device: &Arc<dyn GpuDevice>,
        size: u64,
        usage: BufferUsage,
        memory: MemorySelector,
    ) -> BenchResult<Self> {
        let alloc = device.create_buffer(&BufferDesc {
            size,
            usage,
            memory,
        })?;
        Ok(Self {
            device: device.clone(),
            alloc,
            usage,
        })
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Copy `min(src.size, self.size)` bytes from another buffer.
    ///
    /// When both buffers are host-visible and no command buffer is supplied
    /// the copy is a CPU memcpy with CPU timing only.
    pub fn copy_from_buffer(
        &self,
        ctx: &mut BenchContext,
        src: &Buffer,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        let bytes = src.size().min(self.size());
        if cmd.is_none() && copy::host_visible_pair(src, self) {
            return copy::host_copy(ctx, src.id(), self.id(), bytes);
        }
        let command = Command::CopyBuffer {
            src: src.id(),
            dst: self.id(),
            size: bytes,
        };
        copy::record_or_submit(ctx, "buf2buf", command, bytes, cmd)
    }

    /// Read an image back into this buffer.
    ///
    /// A host-visible pair without a command buffer is copied by the CPU.
    ///
    /// Copies as many full rows as fit; a buffer smaller than one row gets a
    /// partial first row.
    pub fn copy_from_image(
        &self,
        ctx: &mut BenchContext,
        src: &Image,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        let bpp = src.format().bytes_per_pixel();
        let extent = region_within(src.extent(), bpp, self.size())?;
        let bytes = extent.pixels() * bpp;
        if cmd.is_none() && copy::host_visible_pair(src, self) {
            return copy::host_copy(ctx, src.id(), self.id(), bytes);
        }
        let command = Command::CopyImageToBuffer {
            src: src.id(),
            dst: self.id(),
            extent,
        };
        copy::record_or_submit(ctx, "img2buf", command, bytes, cmd)
    }
}

/// Largest region of `extent` whose pixel data fits in `limit` bytes.
pub(crate) fn region_within(extent: Extent2D, bpp: u64, limit: u64) -> BenchResult<Extent2D> {
    let row_bytes = u64::from(extent.width) * bpp;
    let region = if limit >= row_bytes {
        let rows = (limit / row_bytes).min(u64::from(extent.height));
        Extent2D::new(extent.width, rows as u32)
    } else {
        Extent2D::new((limit / bpp) as u32, 1)
    };
    if region.pixels() == 0 {
        return Err(BenchError::InvalidArgument(format!(
            "{} bytes cannot hold a single pixel of {}",
            limit, extent
        )));
    }
    Ok(region)
}

impl Resource for Buffer {
    fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    fn allocation(&self) -> &Allocation {
        &self.alloc
    }

    fn describe(&self) -> String {
        human_readable_size(self.size())
    }
}

impl Allocate for Buffer {
    fn footprint(bytes: u64, _info: &DeviceInfo) -> u64 {
        bytes
    }

    fn allocate(
        device: &Arc<dyn GpuDevice>,
        bytes: u64,
        memory: MemorySelector,
        _tiling: ImageTiling,
    ) -> BenchResult<Self> {
        Self::new(
            device,
            bytes,
            BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
            memory,
        )
    }
}

impl CopyFrom<Buffer> for Buffer {
    fn copy_from(
        &self,
        ctx: &mut BenchContext,
        src: &Buffer,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        self.copy_from_buffer(ctx, src, cmd)
    }
}

impl CopyFrom<Image> for Buffer {
    fn copy_from(
        &self,
        ctx: &mut BenchContext,
        src: &Image,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        self.copy_from_image(ctx, src, cmd)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_resource(self.alloc.id) {
            error!("failed to destroy buffer {}: {}", self.alloc.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membench_device::sim::{SimConfig, SimDevice, SimPreset};
    use membench_device::{ImageUsage, MemoryPropertyFlags};

    const MIB: u64 = 1024 * 1024;

    fn context() -> (Arc<SimDevice>, BenchContext) {
        let sim = Arc::new(
            SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(9)).unwrap(),
        );
        let device: Arc<dyn GpuDevice> = sim.clone();
        let ctx = BenchContext::new(device, Some(9)).unwrap();
        (sim, ctx)
    }

    fn flags(flags: MemoryPropertyFlags) -> MemorySelector {
        MemorySelector::Flags(flags)
    }

    #[test]
    fn test_gpu_copy_yields_both_channels() {
        let (_sim, mut ctx) = context();
        let device = ctx.device().clone();
        let src = Buffer::new(&device, 8 * MIB, BufferUsage::TRANSFER_SRC, flags(MemoryPropertyFlags::DEVICE_LOCAL)).unwrap();
        let dst = Buffer::new(&device, 8 * MIB, BufferUsage::TRANSFER_DST, flags(MemoryPropertyFlags::HOST_VISIBLE)).unwrap();

        let report = dst.copy_from_buffer(&mut ctx, &src, None).unwrap();
        assert_eq!(report.bytes, 8 * MIB);
        let sample = report.sample.unwrap();
        assert!(sample.is_valid());
        assert!(sample.gpu_ns().unwrap() > 0);
        println!("[PASS] Self-submitted copy has CPU and GPU timing");
    }

    #[test]
    fn test_host_visible_pair_uses_memcpy() {
        let (_sim, mut ctx) = context();
        let device = ctx.device().clone();
        let hv = flags(MemoryPropertyFlags::HOST_VISIBLE);
        let src = Buffer::new(&device, MIB, BufferUsage::TRANSFER_SRC, hv).unwrap();
        let dst = Buffer::new(&device, 2 * MIB, BufferUsage::TRANSFER_DST, hv).unwrap();

        let report = dst.copy_from_buffer(&mut ctx, &src, None).unwrap();
        assert_eq!(report.bytes, MIB);
        let sample = report.sample.unwrap();
        assert!(sample.cpu_ns > 0);
        assert_eq!(sample.gpu_ns(), None);
    }

    #[test]
    fn test_host_visible_image_readback_uses_memcpy() {
        let (_sim, mut ctx) = context();
        let device = ctx.device().clone();
        let hv = flags(MemoryPropertyFlags::HOST_VISIBLE);
        let image = Image::square(&device, MIB, ImageUsage::TRANSFER_SRC, hv, ImageTiling::Linear).unwrap();
        let dst = Buffer::new(&device, MIB, BufferUsage::TRANSFER_DST, hv).unwrap();

        let report = dst.copy_from_image(&mut ctx, &image, None).unwrap();
        assert_eq!(report.bytes, MIB);
        let sample = report.sample.unwrap();
        assert!(sample.cpu_ns > 0);
        assert_eq!(sample.gpu_ns(), None);

        let mut cmd = device.begin_command_buffer("batch").unwrap();
        let recorded = dst.copy_from_image(&mut ctx, &image, Some(&mut cmd)).unwrap();
        assert!(recorded.sample.is_none());
        assert_eq!(cmd.copy_count(), 1);
        device.submit_and_wait(cmd).unwrap();
        println!("[PASS] Host-visible image readback is a CPU copy");
    }

    #[test]
    fn test_external_command_buffer_only_records() {
        let (_sim, mut ctx) = context();
        let device = ctx.device().clone();
        let hv = flags(MemoryPropertyFlags::HOST_VISIBLE);
        let src = Buffer::new(&device, MIB, BufferUsage::TRANSFER_SRC, hv).unwrap();
        let dst = Buffer::new(&device, MIB, BufferUsage::TRANSFER_DST, hv).unwrap();

        let mut cmd = device.begin_command_buffer("batch").unwrap();
        let report = dst.copy_from_buffer(&mut ctx, &src, Some(&mut cmd)).unwrap();
        assert!(report.sample.is_none());
        // Host-visible pair still records a GPU copy when batching.
        assert_eq!(cmd.copy_count(), 1);
        device.submit_and_wait(cmd).unwrap();
    }

    #[test]
    fn test_drop_releases_memory() {
        let (sim, ctx) = context();
        let device = ctx.device().clone();
        {
            let _buf = Buffer::new(&device, 64 * MIB, BufferUsage::TRANSFER_DST, flags(MemoryPropertyFlags::DEVICE_LOCAL)).unwrap();
            assert_eq!(sim.heap_used(0), 64 * MIB);
        }
        assert_eq!(sim.heap_used(0), 0);
        assert_eq!(sim.live_resources(), 0);
    }

    #[test]
    fn test_region_within() {
        let extent = Extent2D::new(1024, 1024);
        // 100 rows of 16 KiB.
        assert_eq!(region_within(extent, 16, 100 * 16 * 1024).unwrap(), Extent2D::new(1024, 100));
        assert_eq!(region_within(extent, 16, u64::MAX).unwrap(), extent);
        assert_eq!(region_within(extent, 16, 160).unwrap(), Extent2D::new(10, 1));
        assert!(region_within(extent, 16, 8).is_err());
    }
}
