//! Error types for the benchmark engine.
//!
//! Setup failures (resource creation, missing memory types, lost devices)
//! propagate as [`BenchError`] and abort the run with no partial table.
//! Precondition violations in the timing layer panic instead.

use membench_device::DeviceError;

/// Result type alias for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Benchmark engine errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Device-level failure.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Statistics input rejected (empty, negative or non-finite).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A heap is too small to hold even a minimal test resource.
    #[error("Heap {heap} too small: {available} bytes available for {units} allocations")]
    InsufficientHeap {
        /// Heap index.
        heap: u32,
        /// Bytes usable after headroom.
        available: u64,
        /// Allocations that must share the heap.
        units: u32,
    },

    /// Report serialization failed.
    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BenchError {
    /// True for errors caused by user-supplied configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::Device(DeviceError::InvalidConfig(_))
                | Self::Device(DeviceError::DeviceIndexOutOfRange { .. })
        )
    }
}
