//! Shared copy submission path.

use membench_device::{Command, CommandBuffer, ResourceId};
use tracing::trace;

use super::Resource;
use crate::context::BenchContext;
use crate::error::BenchResult;
use crate::timing::{Timer, TimingSample};

/// Outcome of one copy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    /// Bytes moved.
    pub bytes: u64,
    /// Timing, present only for self-submitted copies.
    pub sample: Option<TimingSample>,
}

/// Record `command` into `cmd`, or submit it alone under a fresh [`Timer`].
pub(crate) fn record_or_submit(
    ctx: &mut BenchContext,
    label: &str,
    command: Command,
    bytes: u64,
    cmd: Option<&mut CommandBuffer>,
) -> BenchResult<CopyReport> {
    if let Some(cmd) = cmd {
        cmd.record(command);
        return Ok(CopyReport {
            bytes,
            sample: None,
        });
    }

    let mut timer = Timer::new(ctx.timestamp_period());
    timer.cpu_begin();
    let device = ctx.device().clone();
    let mut cmd = device.begin_command_buffer(label)?;
    timer.gpu_begin(ctx.queries_mut(), &mut cmd);
    cmd.record(command);
    timer.gpu_end(ctx.queries_mut(), &mut cmd);
    device.submit_and_wait(cmd)?;
    timer.cpu_end();
    timer.readback_gpu_timestamps(ctx.queries())?;

    let sample = timer.sample();
    trace!(
        "{}: {} bytes, cpu {} ns, gpu {:?} ns",
        label,
        bytes,
        sample.cpu_ns,
        sample.gpu_ns()
    );
    Ok(CopyReport {
        bytes,
        sample: Some(sample),
    })
}

/// Both ends are host-visible, so an unbatched copy runs as a host memcpy.
pub(crate) fn host_visible_pair<S, D>(src: &S, dst: &D) -> bool
where
    S: Resource + ?Sized,
    D: Resource + ?Sized,
{
    src.memory_flags().is_host_visible() && dst.memory_flags().is_host_visible()
}

/// CPU memcpy between two host-visible resources, timed on the CPU only.
pub(crate) fn host_copy(
    ctx: &BenchContext,
    src: ResourceId,
    dst: ResourceId,
    bytes: u64,
) -> BenchResult<CopyReport> {
    let mut timer = Timer::new(ctx.timestamp_period());
    timer.cpu_begin();
    ctx.device().host_copy(src, dst, bytes)?;
    timer.cpu_end();
    Ok(CopyReport {
        bytes,
        sample: Some(timer.sample()),
    })
}
