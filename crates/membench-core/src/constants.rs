//! Engine constants.

/// Bytes per MiB.
pub const MIB: u64 = 1024 * 1024;

/// Bytes per GiB.
pub const GIB: u64 = 1024 * MIB;

/// Measured iterations per matrix cell.
pub const DEFAULT_LOOPS: usize = 30;

/// Elements per source resource group.
pub const DEFAULT_GROUP_SIZE: usize = 10;

/// Smallest swept test size.
pub const DEFAULT_MIN_SIZE: u64 = 32 * MIB;

/// Largest swept test size before heap planning.
pub const DEFAULT_MAX_SIZE: u64 = 256 * MIB;

/// Smallest test size accepted by configuration.
pub const MIN_TEST_SIZE: u64 = 64 * 1024;

/// Wall-clock duration of profile mode, in seconds.
pub const DEFAULT_PROFILE_SECS: u64 = 10;

/// Copies recorded per command buffer in profile mode.
pub const MAX_COMMANDS_PER_BUFFER: usize = 1000;

/// Fraction of a heap the planner is allowed to fill.
pub const HEAP_HEADROOM_FRACTION: f64 = 0.80;

/// Planned sizes are rounded down to this granularity.
pub const PLAN_GRANULARITY: u64 = 4096;

/// Scale factor turning a median absolute deviation into a normal-sigma estimate.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Timestamp slots per query pool: one begin, one end.
pub const QUERY_POOL_CAPACITY: u32 = 2;

/// Size of the random block that noise fills are built from.
pub const NOISE_BLOCK_BYTES: usize = 1024 * 1024;
