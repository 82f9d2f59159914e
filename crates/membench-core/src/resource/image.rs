//! Square 2D image resource.

use std::sync::Arc;

use membench_device::{
    human_readable_size, Allocation, Command, CommandBuffer, DeviceInfo, Extent2D, GpuDevice,
    ImageDesc, ImageFormat, ImageTiling, ImageUsage, MemorySelector,
};
use tracing::error;

use super::buffer::{region_within, Buffer};
use super::copy::{self, CopyReport};
use super::{Allocate, CopyFrom, Resource};
use crate::context::BenchContext;
use crate::error::BenchResult;

/// Pixel format of every benchmark image: 16 bytes per pixel.
pub const IMAGE_FORMAT: ImageFormat = ImageFormat::R32G32B32A32Sfloat;

/// Largest square extent of `format` that fits in `bytes`, clamped to
/// `1..=max_dimension`.
pub fn square_extent(bytes: u64, format: ImageFormat, max_dimension: u32) -> Extent2D {
    let pixels = bytes / format.bytes_per_pixel();
    let mut side = (pixels as f64).sqrt().floor() as u64;
    // Guard against float rounding on large inputs.
    while side * side > pixels {
        side -= 1;
    }
    let side = side.clamp(1, u64::from(max_dimension.max(1))) as u32;
    Extent2D::new(side, side)
}

/// A device image, destroyed on drop.
///
/// # Drop Behavior
///
/// Calls `destroy_resource` on drop. NEVER panics - logs errors instead.
#[derive(Debug)]
pub struct Image {
    device: Arc<dyn GpuDevice>,
    alloc: Allocation,
    format: ImageFormat,
    extent: Extent2D,
    tiling: ImageTiling,
    usage: ImageUsage,
}

impl Image {
    pub fn new(
        device: &Arc<dyn GpuDevice>,
        format: ImageFormat,
        extent: Extent2D,
        usage: ImageUsage,
        memory: MemorySelector,
        tiling: ImageTiling,
    ) -> BenchResult<Self> {
        let alloc = device.create_image(&ImageDesc {
            format,
            extent,
            usage,
            memory,
            tiling,
        })?;
        Ok(Self {
            device: device.clone(),
            alloc,
            format,
            extent,
            tiling,
            usage,
        })
    }

    /// Square [`IMAGE_FORMAT`] image of at most `bytes`.
    pub fn square(
        device: &Arc<dyn GpuDevice>,
        bytes: u64,
        usage: ImageUsage,
        memory: MemorySelector,
        tiling: ImageTiling,
    ) -> BenchResult<Self> {
        let extent = square_extent(bytes, IMAGE_FORMAT, device.info().max_image_dimension);
        Self::new(device, IMAGE_FORMAT, extent, usage, memory, tiling)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn tiling(&self) -> ImageTiling {
        self.tiling
    }

    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    /// Upload from a buffer; rows that do not fit in the buffer are skipped.
    /// Host-visible pairs without a command buffer go through a CPU memcpy.
    pub fn copy_from_buffer(
        &self,
        ctx: &mut BenchContext,
        src: &Buffer,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        let bpp = self.format.bytes_per_pixel();
        let extent = region_within(self.extent, bpp, src.size())?;
        let bytes = extent.pixels() * bpp;
        if cmd.is_none() && copy::host_visible_pair(src, self) {
            return copy::host_copy(ctx, src.id(), self.id(), bytes);
        }
        let command = Command::CopyBufferToImage {
            src: src.id(),
            dst: self.id(),
            extent,
        };
        copy::record_or_submit(ctx, "buf2img", command, bytes, cmd)
    }

    /// Copy the overlapping region of another image.
    pub fn copy_from_image(
        &self,
        ctx: &mut BenchContext,
        src: &Image,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        let extent = self.extent.min(src.extent);
        let bytes = extent.pixels() * self.format.bytes_per_pixel();
        if cmd.is_none() && copy::host_visible_pair(src, self) {
            return copy::host_copy(ctx, src.id(), self.id(), bytes);
        }
        let command = Command::CopyImage {
            src: src.id(),
            dst: self.id(),
            extent,
        };
        copy::record_or_submit(ctx, "img2img", command, bytes, cmd)
    }
}

impl Resource for Image {
    fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    fn allocation(&self) -> &Allocation {
        &self.alloc
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.extent, human_readable_size(self.size()).trim_start())
    }
}

impl Allocate for Image {
    fn footprint(bytes: u64, info: &DeviceInfo) -> u64 {
        square_extent(bytes, IMAGE_FORMAT, info.max_image_dimension).pixels()
            * IMAGE_FORMAT.bytes_per_pixel()
    }

    fn allocate(
        device: &Arc<dyn GpuDevice>,
        bytes: u64,
        memory: MemorySelector,
        tiling: ImageTiling,
    ) -> BenchResult<Self> {
        Self::square(
            device,
            bytes,
            ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST,
            memory,
            tiling,
        )
    }
}

impl CopyFrom<Buffer> for Image {
    fn copy_from(
        &self,
        ctx: &mut BenchContext,
        src: &Buffer,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        self.copy_from_buffer(ctx, src, cmd)
    }
}

impl CopyFrom<Image> for Image {
    fn copy_from(
        &self,
        ctx: &mut BenchContext,
        src: &Image,
        cmd: Option<&mut CommandBuffer>,
    ) -> BenchResult<CopyReport> {
        self.copy_from_image(ctx, src, cmd)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_resource(self.alloc.id) {
            error!("failed to destroy image {}: {}", self.alloc.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membench_device::sim::{SimConfig, SimDevice, SimPreset};
    use membench_device::{BufferUsage, MemoryPropertyFlags};

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_square_extent() {
        assert_eq!(square_extent(256 * MIB, IMAGE_FORMAT, 16384), Extent2D::new(4096, 4096));
        assert_eq!(square_extent(32 * MIB, IMAGE_FORMAT, 16384), Extent2D::new(1448, 1448));
        assert_eq!(square_extent(256 * MIB, IMAGE_FORMAT, 1024), Extent2D::new(1024, 1024));
        assert_eq!(square_extent(0, IMAGE_FORMAT, 16384), Extent2D::new(1, 1));
        println!("[PASS] Square extents floor(sqrt(bytes / 16))");
    }

    #[test]
    fn test_image_round_trip_through_buffer() {
        let device: Arc<dyn GpuDevice> = Arc::new(
            SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(2)).unwrap(),
        );
        let mut ctx = BenchContext::new(device.clone(), Some(2)).unwrap();
        let dl = MemorySelector::Flags(MemoryPropertyFlags::DEVICE_LOCAL);
        let hv = MemorySelector::Flags(MemoryPropertyFlags::HOST_VISIBLE);

        let image = Image::square(&device, 16 * MIB, ImageUsage::TRANSFER_SRC, dl, ImageTiling::Optimal).unwrap();
        assert_eq!(image.extent(), Extent2D::new(1024, 1024));
        assert_eq!(image.describe(), "1024x1024 (16.0 MB)");

        let staging = Buffer::new(&device, 16 * MIB, BufferUsage::TRANSFER_DST, hv).unwrap();
        let down = staging.copy_from_image(&mut ctx, &image, None).unwrap();
        assert_eq!(down.bytes, 16 * MIB);
        assert!(down.sample.unwrap().gpu_ns().unwrap() > 0);

        let linear = Image::square(&device, 4 * MIB, ImageUsage::TRANSFER_DST, hv, ImageTiling::Linear).unwrap();
        let report = linear.copy_from_image(&mut ctx, &image, None).unwrap();
        assert_eq!(report.bytes, 4 * MIB);
        let up = linear.copy_from_buffer(&mut ctx, &staging, None).unwrap();
        assert_eq!(up.bytes, 4 * MIB);
    }

    #[test]
    fn test_host_visible_image_copies_use_memcpy() {
        let device: Arc<dyn GpuDevice> = Arc::new(
            SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(4)).unwrap(),
        );
        let mut ctx = BenchContext::new(device.clone(), Some(4)).unwrap();
        let hv = MemorySelector::Flags(MemoryPropertyFlags::HOST_VISIBLE);
        let usage = ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST;

        let staging = Buffer::new(&device, 4 * MIB, BufferUsage::TRANSFER_SRC, hv).unwrap();
        let first = Image::square(&device, 4 * MIB, usage, hv, ImageTiling::Linear).unwrap();
        let second = Image::square(&device, 4 * MIB, usage, hv, ImageTiling::Linear).unwrap();

        let upload = first.copy_from_buffer(&mut ctx, &staging, None).unwrap();
        let blit = second.copy_from_image(&mut ctx, &first, None).unwrap();
        for report in [upload, blit] {
            assert_eq!(report.bytes, 4 * MIB);
            let sample = report.sample.unwrap();
            assert!(sample.cpu_ns > 0);
            assert_eq!(sample.gpu_ns(), None);
        }

        // A device-local end keeps the GPU path.
        let dl = MemorySelector::Flags(MemoryPropertyFlags::DEVICE_LOCAL);
        let optimal = Image::square(&device, 4 * MIB, usage, dl, ImageTiling::Optimal).unwrap();
        let gpu = optimal.copy_from_buffer(&mut ctx, &staging, None).unwrap();
        assert!(gpu.sample.unwrap().gpu_ns().is_some());
        println!("[PASS] Host-visible buf2img and img2img are CPU copies");
    }
}
