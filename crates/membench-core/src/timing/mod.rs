//! CPU and GPU timing.
//!
//! A [`QueryPool`] owns the two timestamp slots of a device. A [`Timer`]
//! brackets one measured submission: the CPU side with a monotonic clock, the
//! GPU side with a reset plus top-of-pipe/bottom-of-pipe timestamp pair.

mod query_pool;
mod timer;

pub use query_pool::{QueryPool, QuerySlot};
pub use timer::{ticks_to_ns, GpuTiming, Timer, TimingSample};
