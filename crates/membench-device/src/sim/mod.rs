//! Simulated GPU backend.
//!
//! [`SimDevice`] implements [`GpuDevice`] on top of a bandwidth model and a
//! virtual GPU clock. Copies advance the clock by their modeled duration with
//! seeded jitter and occasional stalls; timestamps latch the clock in ticks of
//! the configured period. With [`SimConfig::realtime`] the submitting thread
//! also blocks for the modeled duration so CPU-side timers see realistic
//! numbers.
//!
//! Resource contents are not stored: host writes are bounds-checked and then
//! discarded.

mod bandwidth;
mod config;
mod heaps;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

pub use bandwidth::{BandwidthModel, MemoryLocation};
pub use config::{SimConfig, SimPreset};
pub use heaps::HeapTracker;

use crate::command::{Command, CommandBuffer, CommandBufferId, QueryPoolId};
use crate::device::{DeviceInfo, GpuDevice};
use crate::error::{DeviceError, DeviceResult};
use crate::memory::{human_readable_size, MemoryLayout, MemoryPropertyFlags};
use crate::resource::{
    Allocation, BufferDesc, Extent2D, ImageDesc, ImageFormat, ImageTiling, ResourceId,
};

/// Buffer allocations are rounded up to this many bytes.
const BUFFER_ALIGNMENT: u64 = 256;
/// Image allocations are rounded up to this many bytes.
const IMAGE_ALIGNMENT: u64 = 64 * 1024;
/// Largest width or height of a simulated image.
const MAX_IMAGE_DIMENSION: u32 = 16_384;
/// Virtual clock value at device creation.
const CLOCK_START_NS: f64 = 1_000_000.0;
/// Below this, real-time pacing spins instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

/// Names of the available simulated devices, in index order.
pub fn enumerate() -> Vec<(u32, &'static str)> {
    SimPreset::ALL
        .iter()
        .enumerate()
        .map(|(index, preset)| (index as u32, preset.device_name()))
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Buffer,
    Image {
        extent: Extent2D,
        format: ImageFormat,
        tiling: ImageTiling,
    },
}

#[derive(Debug, Clone, Copy)]
struct SimResource {
    alloc: Allocation,
    shape: Shape,
}

impl SimResource {
    fn location(&self) -> MemoryLocation {
        MemoryLocation::of(self.alloc.memory_flags)
    }

    fn tiling(&self) -> Option<ImageTiling> {
        match self.shape {
            Shape::Buffer => None,
            Shape::Image { tiling, .. } => Some(tiling),
        }
    }
}

#[derive(Debug)]
struct SimState {
    next_resource: u64,
    next_command_buffer: u64,
    next_query_pool: u64,
    resources: HashMap<ResourceId, SimResource>,
    heaps: HeapTracker,
    query_pools: HashMap<QueryPoolId, Vec<Option<u64>>>,
    /// Begun but not yet submitted. Ids below `next_command_buffer` that
    /// are absent here have completed.
    pending: HashSet<CommandBufferId>,
    clock_ns: f64,
    rng: ChaCha8Rng,
}

impl SimState {
    fn resource(&self, id: ResourceId) -> DeviceResult<&SimResource> {
        self.resources.get(&id).ok_or(DeviceError::UnknownResource(id))
    }
}

/// Simulated GPU device.
///
/// # Example
///
/// ```
/// use membench_device::sim::{SimConfig, SimDevice, SimPreset};
/// use membench_device::{BufferDesc, BufferUsage, GpuDevice, MemoryPropertyFlags, MemorySelector};
///
/// let device = SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(1)).unwrap();
/// let src = device.create_buffer(&BufferDesc {
///     size: 1 << 20,
///     usage: BufferUsage::TRANSFER_SRC,
///     memory: MemorySelector::Flags(MemoryPropertyFlags::DEVICE_LOCAL),
/// }).unwrap();
/// let dst = device.create_buffer(&BufferDesc {
///     size: 1 << 20,
///     usage: BufferUsage::TRANSFER_DST,
///     memory: MemorySelector::Flags(MemoryPropertyFlags::HOST_VISIBLE),
/// }).unwrap();
///
/// let mut cmd = device.begin_command_buffer("copy").unwrap();
/// cmd.copy_buffer(src.id, dst.id, 1 << 20);
/// let id = cmd.id();
/// device.submit_and_wait(cmd).unwrap();
/// assert!(device.is_complete(id));
/// ```
#[derive(Debug)]
pub struct SimDevice {
    info: DeviceInfo,
    config: SimConfig,
    model: BandwidthModel,
    state: Mutex<SimState>,
}

impl SimDevice {
    /// Open a device built from a preset.
    ///
    /// # Errors
    ///
    /// `DeviceError::InvalidConfig` when `config` fails validation.
    pub fn new(preset: SimPreset, config: SimConfig) -> DeviceResult<Self> {
        let index = SimPreset::ALL
            .iter()
            .position(|candidate| *candidate == preset)
            .unwrap_or(0) as u32;
        Self::with_layout(
            preset.device_name(),
            index,
            preset.layout()?,
            preset.max_allocation_size(),
            config,
        )
    }

    /// Open the device at `index` in [`enumerate`] order.
    ///
    /// # Errors
    ///
    /// `DeviceError::DeviceIndexOutOfRange` for an unknown index.
    pub fn open(index: u32, config: SimConfig) -> DeviceResult<Self> {
        let preset = SimPreset::ALL
            .get(index as usize)
            .copied()
            .ok_or(DeviceError::DeviceIndexOutOfRange {
                index,
                count: SimPreset::ALL.len(),
            })?;
        Self::new(preset, config)
    }

    /// Open a device with a custom memory layout.
    pub fn with_layout(
        name: &str,
        index: u32,
        layout: MemoryLayout,
        max_allocation_size: u64,
        config: SimConfig,
    ) -> DeviceResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let model = BandwidthModel::for_layout(&layout);
        let state = SimState {
            next_resource: 1,
            next_command_buffer: 1,
            next_query_pool: 1,
            resources: HashMap::new(),
            heaps: HeapTracker::new(&layout),
            query_pools: HashMap::new(),
            pending: HashSet::new(),
            clock_ns: CLOCK_START_NS,
            rng,
        };
        debug!(
            "opened simulated device '{}' ({} heaps, {} memory types, realtime={})",
            name,
            layout.heaps().len(),
            layout.types().len(),
            config.realtime
        );
        Ok(Self {
            info: DeviceInfo {
                name: name.to_string(),
                index,
                timestamp_period: config.timestamp_period,
                max_allocation_size,
                max_image_dimension: MAX_IMAGE_DIMENSION,
                memory: layout,
            },
            config,
            model,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Bytes currently allocated on `heap`.
    pub fn heap_used(&self, heap: u32) -> u64 {
        self.state.lock().heaps.used(heap)
    }

    /// Highest simultaneous usage seen on `heap`.
    pub fn heap_peak(&self, heap: u32) -> u64 {
        self.state.lock().heaps.peak(heap)
    }

    /// Number of live buffers and images.
    pub fn live_resources(&self) -> usize {
        self.state.lock().resources.len()
    }

    fn allocate(
        &self,
        size: u64,
        alignment: u64,
        memory_type_index: u32,
        shape: Shape,
    ) -> DeviceResult<Allocation> {
        if size == 0 {
            return Err(DeviceError::ResourceCreation(
                "zero-sized resource".to_string(),
            ));
        }
        let layout = &self.info.memory;
        let memory_type = layout.memory_type(memory_type_index)?;
        let allocation_size = size.div_ceil(alignment) * alignment;
        if allocation_size > self.info.max_allocation_size {
            return Err(DeviceError::AllocationTooLarge {
                requested: allocation_size,
                max: self.info.max_allocation_size,
            });
        }

        let mut state = self.state.lock();
        state.heaps.allocate(memory_type.heap_index, allocation_size)?;
        let id = ResourceId(state.next_resource);
        state.next_resource += 1;
        let alloc = Allocation {
            id,
            size,
            allocation_size,
            memory_type_index,
            memory_flags: memory_type.flags,
            heap_index: memory_type.heap_index,
        };
        state.resources.insert(id, SimResource { alloc, shape });
        debug!(
            "created {} ({}) on type {} [{}]",
            id,
            human_readable_size(size),
            memory_type_index,
            memory_type.flags
        );
        Ok(alloc)
    }

    /// Advance the clock for one copy and return its duration in ns.
    fn run_copy(
        &self,
        state: &mut SimState,
        src: &SimResource,
        dst: &SimResource,
        bytes: u64,
    ) -> f64 {
        let mut gbps = self.model.copy_gbps(src.location(), dst.location());
        for tiling in [src.tiling(), dst.tiling()].into_iter().flatten() {
            gbps *= self.model.tiling_factor(tiling);
        }
        let base = self.model.copy_ns(bytes, gbps, self.config.copy_overhead_ns);
        let duration = base * self.noise_factor(&mut state.rng);
        state.clock_ns += duration;
        duration
    }

    fn noise_factor(&self, rng: &mut ChaCha8Rng) -> f64 {
        let mut factor = 1.0;
        if self.config.jitter > 0.0 {
            factor += rng.gen_range(-self.config.jitter..=self.config.jitter);
        }
        if self.config.outlier_rate > 0.0 && rng.gen_bool(self.config.outlier_rate) {
            factor *= self.config.outlier_factor;
        }
        factor
    }

    fn execute(
        &self,
        state: &mut SimState,
        cmd_id: CommandBufferId,
        command: &Command,
    ) -> DeviceResult<f64> {
        let invalid = |reason: String| DeviceError::InvalidCommand {
            command_buffer: cmd_id,
            reason,
        };
        match *command {
            Command::ResetQueries { pool, first, count } => {
                let slots = state
                    .query_pools
                    .get_mut(&pool)
                    .ok_or(DeviceError::UnknownQueryPool(pool))?;
                let end = first as usize + count as usize;
                if end > slots.len() {
                    return Err(invalid(format!(
                        "reset of slots {}..{} exceeds pool capacity {}",
                        first,
                        end,
                        slots.len()
                    )));
                }
                slots[first as usize..end].fill(None);
                Ok(0.0)
            }
            Command::WriteTimestamp { pool, slot, .. } => {
                let period = f64::from(self.info.timestamp_period);
                let ticks = (state.clock_ns / period) as u64;
                let slots = state
                    .query_pools
                    .get_mut(&pool)
                    .ok_or(DeviceError::UnknownQueryPool(pool))?;
                let capacity = slots.len();
                let entry = slots.get_mut(slot as usize).ok_or_else(|| {
                    invalid(format!("timestamp slot {} exceeds pool capacity {}", slot, capacity))
                })?;
                *entry = Some(ticks);
                Ok(0.0)
            }
            Command::CopyBuffer { src, dst, size } => {
                let (src, dst) = (*state.resource(src)?, *state.resource(dst)?);
                if size > src.alloc.size || size > dst.alloc.size {
                    return Err(invalid(format!(
                        "copy of {} bytes exceeds source ({}) or destination ({})",
                        size, src.alloc.size, dst.alloc.size
                    )));
                }
                Ok(self.run_copy(state, &src, &dst, size))
            }
            Command::CopyBufferToImage { src, dst, extent }
            | Command::CopyImageToBuffer { src, dst, extent }
            | Command::CopyImage { src, dst, extent } => {
                let (src, dst) = (*state.resource(src)?, *state.resource(dst)?);
                let bytes = image_copy_bytes(command, &src, &dst, extent).map_err(invalid)?;
                Ok(self.run_copy(state, &src, &dst, bytes))
            }
        }
    }

    fn pace(&self, modeled_ns: f64) {
        if !self.config.realtime || self.config.time_scale == 0.0 {
            return;
        }
        let target = Duration::from_nanos((modeled_ns * self.config.time_scale) as u64);
        let deadline = Instant::now() + target;
        if target > SPIN_THRESHOLD {
            std::thread::sleep(target - SPIN_THRESHOLD);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Bytes moved by an image copy, checking shapes on both ends.
fn image_copy_bytes(
    command: &Command,
    src: &SimResource,
    dst: &SimResource,
    extent: Extent2D,
) -> Result<u64, String> {
    let image_extent = |resource: &SimResource| match resource.shape {
        Shape::Image { extent, format, .. } => Ok((extent, format)),
        Shape::Buffer => Err(format!("{} is a buffer, expected an image", resource.alloc.id)),
    };
    let expect_buffer = |resource: &SimResource| match resource.shape {
        Shape::Buffer => Ok(resource.alloc.size),
        Shape::Image { .. } => Err(format!("{} is an image, expected a buffer", resource.alloc.id)),
    };
    let fits = |limit: Extent2D| extent.width <= limit.width && extent.height <= limit.height;

    if extent.pixels() == 0 {
        return Err("empty copy region".to_string());
    }
    match command {
        Command::CopyBufferToImage { .. } => {
            let buffer_size = expect_buffer(src)?;
            let (image, format) = image_extent(dst)?;
            let bytes = extent.pixels() * format.bytes_per_pixel();
            if !fits(image) || bytes > buffer_size {
                return Err(format!("region {} does not fit {} / {} bytes", extent, image, buffer_size));
            }
            Ok(bytes)
        }
        Command::CopyImageToBuffer { .. } => {
            let (image, format) = image_extent(src)?;
            let buffer_size = expect_buffer(dst)?;
            let bytes = extent.pixels() * format.bytes_per_pixel();
            if !fits(image) || bytes > buffer_size {
                return Err(format!("region {} does not fit {} / {} bytes", extent, image, buffer_size));
            }
            Ok(bytes)
        }
        _ => {
            let (src_extent, format) = image_extent(src)?;
            let (dst_extent, dst_format) = image_extent(dst)?;
            if format != dst_format {
                return Err("image formats differ".to_string());
            }
            if !fits(src_extent) || !fits(dst_extent) {
                return Err(format!("region {} does not fit {} / {}", extent, src_extent, dst_extent));
            }
            Ok(extent.pixels() * format.bytes_per_pixel())
        }
    }
}

impl GpuDevice for SimDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<Allocation> {
        let layout = &self.info.memory;
        let memory_type_index = layout.resolve(desc.memory, layout.all_types_filter())?;
        self.allocate(desc.size, BUFFER_ALIGNMENT, memory_type_index, Shape::Buffer)
    }

    fn create_image(&self, desc: &ImageDesc) -> DeviceResult<Allocation> {
        let extent = desc.extent;
        if extent.width == 0
            || extent.height == 0
            || extent.width > MAX_IMAGE_DIMENSION
            || extent.height > MAX_IMAGE_DIMENSION
        {
            return Err(DeviceError::ResourceCreation(format!(
                "image extent {} outside 1..={}",
                extent, MAX_IMAGE_DIMENSION
            )));
        }
        let layout = &self.info.memory;
        // Optimal tiling is only backed by device-local memory.
        let filter = match desc.tiling {
            ImageTiling::Optimal => layout.types_with(MemoryPropertyFlags::DEVICE_LOCAL),
            ImageTiling::Linear => layout.all_types_filter(),
        };
        let memory_type_index = layout.resolve(desc.memory, filter)?;
        self.allocate(
            desc.byte_size(),
            IMAGE_ALIGNMENT,
            memory_type_index,
            Shape::Image {
                extent,
                format: desc.format,
                tiling: desc.tiling,
            },
        )
    }

    fn destroy_resource(&self, id: ResourceId) -> DeviceResult<()> {
        let mut state = self.state.lock();
        let resource = state
            .resources
            .remove(&id)
            .ok_or(DeviceError::UnknownResource(id))?;
        state
            .heaps
            .release(resource.alloc.heap_index, resource.alloc.allocation_size);
        debug!("destroyed {}", id);
        Ok(())
    }

    fn write(&self, id: ResourceId, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let state = self.state.lock();
        let resource = state.resource(id)?;
        let len = data.len() as u64;
        let size = resource.alloc.size;
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(DeviceError::WriteOutOfBounds { offset, len, size });
        }
        Ok(())
    }

    fn host_copy(&self, src: ResourceId, dst: ResourceId, size: u64) -> DeviceResult<()> {
        let duration = {
            let mut state = self.state.lock();
            let (src, dst) = (*state.resource(src)?, *state.resource(dst)?);
            for resource in [&src, &dst] {
                if !resource.alloc.memory_flags.is_host_visible() {
                    return Err(DeviceError::InvalidOperation(format!(
                        "host copy needs host-visible memory, {} is {}",
                        resource.alloc.id, resource.alloc.memory_flags
                    )));
                }
            }
            if size > src.alloc.size || size > dst.alloc.size {
                return Err(DeviceError::InvalidOperation(format!(
                    "host copy of {} bytes exceeds source ({}) or destination ({})",
                    size, src.alloc.size, dst.alloc.size
                )));
            }
            let base = size as f64 / self.model.host_copy_gbps();
            base * self.noise_factor(&mut state.rng)
        };
        self.pace(duration);
        Ok(())
    }

    fn begin_command_buffer(&self, label: &str) -> DeviceResult<CommandBuffer> {
        let mut state = self.state.lock();
        let id = CommandBufferId(state.next_command_buffer);
        state.next_command_buffer += 1;
        state.pending.insert(id);
        Ok(CommandBuffer::new(id, label))
    }

    fn submit_and_wait(&self, cmd: CommandBuffer) -> DeviceResult<()> {
        let id = cmd.id();
        let label = cmd.label().to_string();
        let modeled_ns = {
            let mut state = self.state.lock();
            if !state.pending.contains(&id) {
                let reason = if id.0 >= 1 && id.0 < state.next_command_buffer {
                    "command buffer submitted twice"
                } else {
                    "command buffer was never begun"
                };
                return Err(DeviceError::InvalidCommand {
                    command_buffer: id,
                    reason: reason.to_string(),
                });
            }
            let mut total = 0.0;
            for command in cmd.commands() {
                total += self.execute(&mut state, id, command)?;
            }
            state.pending.remove(&id);
            total
        };
        trace!(
            "{} '{}' completed: {} commands, {:.0} ns modeled",
            id,
            label,
            cmd.len(),
            modeled_ns
        );
        self.pace(modeled_ns);
        Ok(())
    }

    fn is_complete(&self, id: CommandBufferId) -> bool {
        let state = self.state.lock();
        id.0 >= 1 && id.0 < state.next_command_buffer && !state.pending.contains(&id)
    }

    fn create_query_pool(&self, capacity: u32) -> DeviceResult<QueryPoolId> {
        if capacity == 0 {
            return Err(DeviceError::InvalidOperation(
                "query pool capacity must be positive".to_string(),
            ));
        }
        let mut state = self.state.lock();
        let id = QueryPoolId(state.next_query_pool);
        state.next_query_pool += 1;
        state.query_pools.insert(id, vec![None; capacity as usize]);
        debug!("created {} with {} slots", id, capacity);
        Ok(id)
    }

    fn destroy_query_pool(&self, pool: QueryPoolId) -> DeviceResult<()> {
        self.state
            .lock()
            .query_pools
            .remove(&pool)
            .map(|_| ())
            .ok_or(DeviceError::UnknownQueryPool(pool))
    }

    fn get_query_results(
        &self,
        pool: QueryPoolId,
        first: u32,
        count: u32,
    ) -> DeviceResult<Vec<u64>> {
        let state = self.state.lock();
        let slots = state
            .query_pools
            .get(&pool)
            .ok_or(DeviceError::UnknownQueryPool(pool))?;
        (first..first + count)
            .map(|slot| {
                slots
                    .get(slot as usize)
                    .copied()
                    .flatten()
                    .ok_or(DeviceError::QueryNotReady { pool, slot })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PipelineStage;
    use crate::memory::BufferUsage;
    use crate::resource::MemorySelector;

    const MIB: u64 = 1024 * 1024;

    fn quiet_device() -> SimDevice {
        SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(3).quiet()).unwrap()
    }

    fn buffer(device: &SimDevice, size: u64, flags: MemoryPropertyFlags) -> Allocation {
        device
            .create_buffer(&BufferDesc {
                size,
                usage: BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
                memory: MemorySelector::Flags(flags),
            })
            .unwrap()
    }

    #[test]
    fn test_timestamps_bracket_copy_duration() {
        let device = quiet_device();
        let src = buffer(&device, 64 * MIB, MemoryPropertyFlags::DEVICE_LOCAL);
        let dst = buffer(&device, 64 * MIB, MemoryPropertyFlags::HOST_VISIBLE);
        let pool = device.create_query_pool(2).unwrap();

        let mut cmd = device.begin_command_buffer("bracket").unwrap();
        cmd.reset_queries(pool, 0, 2);
        cmd.write_timestamp(pool, 0, PipelineStage::TopOfPipe);
        cmd.copy_buffer(src.id, dst.id, 64 * MIB);
        cmd.write_timestamp(pool, 1, PipelineStage::BottomOfPipe);
        device.submit_and_wait(cmd).unwrap();

        let ticks = device.get_query_results(pool, 0, 2).unwrap();
        let expected = DEFAULT_COPY_OVERHEAD + (64 * MIB) as f64 / 24.0;
        let measured = (ticks[1] - ticks[0]) as f64;
        assert!((measured - expected).abs() < 2.0, "measured {} expected {}", measured, expected);
        println!("[PASS] Timestamps bracket the modeled copy: {} ns", measured);
    }

    const DEFAULT_COPY_OVERHEAD: f64 = config::DEFAULT_COPY_OVERHEAD_NS as f64;

    #[test]
    fn test_reset_clears_query_slots() {
        let device = quiet_device();
        let pool = device.create_query_pool(2).unwrap();
        let mut cmd = device.begin_command_buffer("stamp").unwrap();
        cmd.write_timestamp(pool, 0, PipelineStage::TopOfPipe);
        device.submit_and_wait(cmd).unwrap();
        assert!(device.get_query_results(pool, 0, 1).is_ok());
        assert!(matches!(
            device.get_query_results(pool, 1, 1),
            Err(DeviceError::QueryNotReady { slot: 1, .. })
        ));

        let mut cmd = device.begin_command_buffer("reset").unwrap();
        cmd.reset_queries(pool, 0, 2);
        device.submit_and_wait(cmd).unwrap();
        assert!(device.get_query_results(pool, 0, 1).is_err());
    }

    #[test]
    fn test_timestamp_period_scales_ticks() {
        let device = SimDevice::new(
            SimPreset::Discrete,
            SimConfig::default().with_seed(1).quiet().with_timestamp_period(4.0),
        )
        .unwrap();
        let pool = device.create_query_pool(1).unwrap();
        let mut cmd = device.begin_command_buffer("stamp").unwrap();
        cmd.write_timestamp(pool, 0, PipelineStage::TopOfPipe);
        device.submit_and_wait(cmd).unwrap();
        let ticks = device.get_query_results(pool, 0, 1).unwrap();
        assert_eq!(ticks[0], (CLOCK_START_NS / 4.0) as u64);
    }

    #[test]
    fn test_heap_exhaustion_and_release() {
        let device = quiet_device();
        // BAR heap holds 256 MiB.
        let bar = MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE;
        let first = buffer(&device, 200 * MIB, bar);
        assert_eq!(first.heap_index, 2);
        let second = device.create_buffer(&BufferDesc {
            size: 100 * MIB,
            usage: BufferUsage::TRANSFER_DST,
            memory: MemorySelector::Flags(bar),
        });
        assert!(matches!(second, Err(DeviceError::OutOfDeviceMemory { heap: 2, .. })));

        device.destroy_resource(first.id).unwrap();
        assert_eq!(device.heap_used(2), 0);
        assert_eq!(device.live_resources(), 0);
        assert!(device.destroy_resource(first.id).is_err());
        println!("[PASS] Heap accounting enforces capacity");
    }

    #[test]
    fn test_optimal_images_need_device_local_memory() {
        let device = quiet_device();
        let desc = ImageDesc {
            format: ImageFormat::R32G32B32A32Sfloat,
            extent: Extent2D::new(256, 256),
            usage: crate::memory::ImageUsage::TRANSFER_DST,
            memory: MemorySelector::Flags(
                MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED,
            ),
            tiling: ImageTiling::Optimal,
        };
        assert!(matches!(
            device.create_image(&desc),
            Err(DeviceError::MemoryTypeNotFound { .. })
        ));
        let linear = ImageDesc {
            tiling: ImageTiling::Linear,
            ..desc
        };
        let alloc = device.create_image(&linear).unwrap();
        assert_eq!(alloc.size, 256 * 256 * 16);
        assert!(alloc.memory_flags.is_host_visible());
    }

    #[test]
    fn test_host_copy_requires_host_visible() {
        let device = quiet_device();
        let dl = buffer(&device, MIB, MemoryPropertyFlags::DEVICE_LOCAL);
        let hv_a = buffer(&device, MIB, MemoryPropertyFlags::HOST_VISIBLE);
        let hv_b = buffer(&device, MIB, MemoryPropertyFlags::HOST_VISIBLE);
        assert!(device.host_copy(hv_a.id, hv_b.id, MIB).is_ok());
        assert!(matches!(
            device.host_copy(dl.id, hv_b.id, MIB),
            Err(DeviceError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_write_bounds() {
        let device = quiet_device();
        let buf = buffer(&device, 1024, MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(device.write(buf.id, 0, &[0u8; 1024]).is_ok());
        assert!(matches!(
            device.write(buf.id, 512, &[0u8; 1024]),
            Err(DeviceError::WriteOutOfBounds { offset: 512, len: 1024, size: 1024 })
        ));
    }

    #[test]
    fn test_resubmit_rejected() {
        let device = quiet_device();
        let cmd = device.begin_command_buffer("once").unwrap();
        let id = cmd.id();
        assert!(!device.is_complete(id));
        device.submit_and_wait(cmd).unwrap();
        assert!(device.is_complete(id));
        let replay = CommandBuffer::new(id, "replay");
        assert!(device.submit_and_wait(replay).is_err());
    }

    #[test]
    fn test_completion_tracking_stays_bounded() {
        let device = quiet_device();
        let mut ids = Vec::new();
        for _ in 0..1000 {
            let cmd = device.begin_command_buffer("loop").unwrap();
            ids.push(cmd.id());
            device.submit_and_wait(cmd).unwrap();
        }
        assert!(device.state.lock().pending.is_empty());
        assert!(ids.iter().all(|id| device.is_complete(*id)));

        // Out-of-order submission: the older buffer stays incomplete.
        let older = device.begin_command_buffer("older").unwrap();
        let newer = device.begin_command_buffer("newer").unwrap();
        let (older_id, newer_id) = (older.id(), newer.id());
        device.submit_and_wait(newer).unwrap();
        assert!(device.is_complete(newer_id));
        assert!(!device.is_complete(older_id));
        assert_eq!(device.state.lock().pending.len(), 1);
        device.submit_and_wait(older).unwrap();
        assert!(device.is_complete(older_id));

        let unknown = CommandBufferId(1_000_000);
        assert!(!device.is_complete(unknown));
        assert!(device.submit_and_wait(CommandBuffer::new(unknown, "forged")).is_err());
        assert!(device.submit_and_wait(CommandBuffer::new(ids[0], "replay")).is_err());
        println!("[PASS] 1002 submissions leave no completion entries behind");
    }

    #[test]
    fn test_open_by_index() {
        assert_eq!(enumerate().len(), 2);
        let device = SimDevice::open(1, SimConfig::default()).unwrap();
        assert_eq!(device.info().name, "Simulated Integrated GPU");
        assert!(matches!(
            SimDevice::open(9, SimConfig::default()),
            Err(DeviceError::DeviceIndexOutOfRange { index: 9, count: 2 })
        ));
    }
}
