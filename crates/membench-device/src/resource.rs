//! Resource descriptors and handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::{BufferUsage, ImageUsage, MemoryPropertyFlags};

/// Opaque handle of a buffer or image owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// How a resource picks its memory type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemorySelector {
    /// Explicit memory type index.
    Index(u32),
    /// First memory type carrying these flags.
    Flags(MemoryPropertyFlags),
}

impl fmt::Display for MemorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "type {}", index),
            Self::Flags(flags) => write!(f, "{}", flags),
        }
    }
}

/// Image memory arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTiling {
    /// Driver-chosen layout; device-local memory only.
    Optimal,
    /// Row-major layout; any memory type.
    Linear,
}

impl ImageTiling {
    pub fn name(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for ImageTiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Four 32-bit float channels.
    R32G32B32A32Sfloat,
    /// Four 8-bit normalized channels.
    R8G8B8A8Unorm,
}

impl ImageFormat {
    pub const fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::R32G32B32A32Sfloat => 16,
            Self::R8G8B8A8Unorm => 4,
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn pixels(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.width.min(other.width), self.height.min(other.height))
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parameters for [`GpuDevice::create_buffer`](crate::GpuDevice::create_buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemorySelector,
}

/// Parameters for [`GpuDevice::create_image`](crate::GpuDevice::create_image).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub format: ImageFormat,
    pub extent: Extent2D,
    pub usage: ImageUsage,
    pub memory: MemorySelector,
    pub tiling: ImageTiling,
}

impl ImageDesc {
    /// Bytes occupied by the pixel data.
    pub fn byte_size(&self) -> u64 {
        self.extent.pixels() * self.format.bytes_per_pixel()
    }
}

/// What the device reports back after creating a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub id: ResourceId,
    /// Resource size in bytes (pixel data for images).
    pub size: u64,
    /// Bytes charged against the heap, after alignment.
    pub allocation_size: u64,
    pub memory_type_index: u32,
    pub memory_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}
