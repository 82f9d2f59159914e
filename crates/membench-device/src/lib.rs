//! Device abstraction for the membench GPU memory-bandwidth benchmark.
//!
//! The benchmark engine never talks to a driver directly. It consumes the
//! object-safe [`GpuDevice`] trait defined here, which covers:
//! - Memory layout queries (heaps, memory types, property flags)
//! - Buffer and image creation, destruction and host writes
//! - Command buffer recording and synchronous submission
//! - Timestamp query pools
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Simulated | [`sim`] | Deterministic bandwidth model, seeded noise, virtual GPU clock |
//!
//! # Example
//!
//! ```
//! use membench_device::sim::{SimConfig, SimDevice, SimPreset};
//! use membench_device::{GpuDevice, MemoryPropertyFlags};
//!
//! let device = SimDevice::new(SimPreset::Discrete, SimConfig::default()).unwrap();
//! let layout = &device.info().memory;
//! let index = layout
//!     .find_first_memtype_supports(MemoryPropertyFlags::DEVICE_LOCAL, u32::MAX, false)
//!     .unwrap();
//! assert!(layout.flags_of_memory_type_index(index).unwrap().is_device_local());
//! ```

pub mod command;
pub mod device;
pub mod error;
pub mod memory;
pub mod resource;
pub mod sim;

pub use command::{Command, CommandBuffer, CommandBufferId, PipelineStage, QueryPoolId};
pub use device::{DeviceInfo, GpuDevice};
pub use error::{DeviceError, DeviceResult};
pub use memory::{
    human_readable_size, BufferUsage, ImageUsage, MemoryHeap, MemoryLayout,
    MemoryPropertyFlags, MemoryType,
};
pub use resource::{
    Allocation, BufferDesc, Extent2D, ImageDesc, ImageFormat, ImageTiling, MemorySelector,
    ResourceId,
};
