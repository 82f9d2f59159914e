//! Error types for device operations.

use crate::command::{CommandBufferId, QueryPoolId};
use crate::memory::MemoryPropertyFlags;
use crate::resource::ResourceId;

/// Result type alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised by a [`GpuDevice`](crate::GpuDevice) implementation.
///
/// Every variant is fatal for the measurement that triggered it; the engine
/// never retries.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No memory type carries the requested property flags.
    #[error("No memory type supports {flags} (type filter {filter:#x})")]
    MemoryTypeNotFound {
        /// Requested property flags.
        flags: MemoryPropertyFlags,
        /// Bitmask of memory type indices that were eligible.
        filter: u32,
    },

    /// Memory type index outside the device's memory layout.
    #[error("Memory type index {index} out of range ({count} types)")]
    MemoryTypeOutOfRange {
        /// Offending index.
        index: u32,
        /// Number of memory types on the device.
        count: usize,
    },

    /// Explicit memory type index not permitted for the resource.
    #[error("Memory type {index} not allowed for this resource (type filter {filter:#x})")]
    MemoryTypeNotAllowed {
        /// Requested memory type index.
        index: u32,
        /// Bitmask of memory type indices the resource accepts.
        filter: u32,
    },

    /// Heap index outside the device's memory layout.
    #[error("Heap index {index} out of range ({count} heaps)")]
    HeapOutOfRange {
        /// Offending index.
        index: u32,
        /// Number of heaps on the device.
        count: usize,
    },

    /// Memory layout description is inconsistent.
    #[error("Invalid memory layout: {0}")]
    InvalidLayout(String),

    /// Heap exhausted.
    #[error("Out of device memory on heap {heap}: requested {requested} bytes, available {available} bytes")]
    OutOfDeviceMemory {
        /// Heap the allocation targeted.
        heap: u32,
        /// Number of bytes requested.
        requested: u64,
        /// Number of bytes still free on the heap.
        available: u64,
    },

    /// Single allocation larger than the device permits.
    #[error("Allocation of {requested} bytes exceeds max allocation size {max}")]
    AllocationTooLarge {
        /// Number of bytes requested.
        requested: u64,
        /// Device max allocation size.
        max: u64,
    },

    /// Resource descriptor rejected.
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// Resource handle unknown to the device (already destroyed or foreign).
    #[error("Unknown resource {0}")]
    UnknownResource(ResourceId),

    /// Host write outside the resource bounds.
    #[error("Write of {len} bytes at offset {offset} exceeds resource size {size}")]
    WriteOutOfBounds {
        /// Write offset in bytes.
        offset: u64,
        /// Write length in bytes.
        len: u64,
        /// Resource size in bytes.
        size: u64,
    },

    /// Query pool handle unknown to the device.
    #[error("Unknown query pool {0}")]
    UnknownQueryPool(QueryPoolId),

    /// Query slot has no result (never written, or reset since).
    #[error("Query result not available: pool {pool}, slot {slot}")]
    QueryNotReady {
        /// Query pool handle.
        pool: QueryPoolId,
        /// Slot index within the pool.
        slot: u32,
    },

    /// Command buffer contains a command the device cannot execute.
    #[error("Invalid command in {command_buffer}: {reason}")]
    InvalidCommand {
        /// Command buffer that carried the command.
        command_buffer: CommandBufferId,
        /// Why the command was rejected.
        reason: String,
    },

    /// Operation not permitted on this resource (e.g. host access to device-only memory).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Device index does not name an available device.
    #[error("Device index {index} not available ({count} devices)")]
    DeviceIndexOutOfRange {
        /// Requested device index.
        index: u32,
        /// Number of available devices.
        count: usize,
    },

    /// Device stopped responding.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Backend configuration rejected.
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = DeviceError::OutOfDeviceMemory {
            heap: 1,
            requested: 4096,
            available: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("heap 1"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("1024"));

        let err = DeviceError::MemoryTypeNotFound {
            flags: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED,
            filter: 0b1011,
        };
        assert_eq!(
            err.to_string(),
            "No memory type supports HV|HCA (type filter 0xb)"
        );
        println!("[PASS] Device errors render with context");
    }
}
