//! Profile and dump modes.
//!
//! Neither records results. Profile mode keeps the copy engine busy for a
//! wall-clock duration so an external profiler can attach; dump mode issues a
//! single copy per kind so a capture tool sees one of each.

use std::time::{Duration, Instant};

use membench_device::{ImageTiling, MemorySelector};
use serde::Serialize;
use tracing::{debug, info};

use super::{resolve_destinations, source_tilings, TestMatrix};
use crate::config::TransferKind;
use crate::constants::MAX_COMMANDS_PER_BUFFER;
use crate::error::{BenchError, BenchResult};
use crate::resource::{Allocate, CopyFrom, Resource, ResourceGroup};

/// Totals of a profile-mode run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub kind: TransferKind,
    /// Copies recorded.
    pub copies: u64,
    /// Command buffers submitted.
    pub submissions: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Bytes per copy.
    pub bytes_per_copy: u64,
}

/// One dump-mode copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpRecord {
    pub kind: TransferKind,
    /// Source tiling for image sources.
    pub source_tiling: Option<ImageTiling>,
    pub bytes: u64,
    pub cpu_ns: u64,
    pub gpu_ns: Option<u64>,
}

impl<'a> TestMatrix<'a> {
    /// First resolved destination memory type.
    fn primary_destination(&self) -> BenchResult<u32> {
        resolve_destinations(self.ctx.layout(), &self.config.destination_flags)?
            .first()
            .copied()
            .ok_or_else(|| {
                BenchError::InvalidConfig("no destination memory type configured".to_string())
            })
    }

    /// Back-to-back copies of `kind` for the configured duration.
    ///
    /// With a group size of 1 exactly one copy is issued. Otherwise copies
    /// are batched up to [`MAX_COMMANDS_PER_BUFFER`] per command buffer,
    /// cycling both the source and destination groups.
    pub(super) fn profile<S, D>(&mut self, kind: TransferKind) -> BenchResult<ProfileSummary>
    where
        S: Allocate,
        D: Allocate + CopyFrom<S>,
    {
        let config = self.config;
        let destination = self.primary_destination()?;
        let tiling = source_tilings(kind)[0];
        let source_type = self.source_type(tiling)?;

        // The destination group lives alongside the sources; each member is a unit.
        let slots = vec![destination; config.group_size];
        let plan = self.plan(source_type, config.group_size, &slots, config.max_size)?;

        let device = self.ctx.device().clone();
        let source_seed = self.ctx.next_seed();
        let mut sources = ResourceGroup::<S>::init(
            config.group_size,
            &device,
            plan.cap,
            MemorySelector::Index(source_type),
            tiling.unwrap_or(ImageTiling::Linear),
            source_seed,
        )?;
        sources.write_noise()?;
        let destination_seed = self.ctx.next_seed();
        let mut destinations = ResourceGroup::<D>::init(
            config.group_size,
            &device,
            plan.cap,
            MemorySelector::Index(destination),
            ImageTiling::Linear,
            destination_seed,
        )?;

        let duration = config.profile_duration();
        info!(
            "profiling {} for {:.1}s ({} x {})",
            kind,
            duration.as_secs_f64(),
            config.group_size,
            sources.first().describe().trim()
        );

        let start = Instant::now();
        let mut copies = 0u64;
        let mut submissions = 0u64;
        let mut bytes_per_copy = 0;
        if config.group_size == 1 {
            let report = destinations
                .first()
                .copy_from(self.ctx, sources.first(), None)?;
            bytes_per_copy = report.bytes;
            copies = 1;
            submissions = 1;
        } else {
            while start.elapsed() < duration {
                let mut cmd = device.begin_command_buffer(kind.name())?;
                for _ in 0..MAX_COMMANDS_PER_BUFFER {
                    let src = sources.random_pick();
                    let dst = destinations.random_pick();
                    bytes_per_copy = dst.copy_from(self.ctx, src, Some(&mut cmd))?.bytes;
                }
                copies += cmd.copy_count() as u64;
                device.submit_and_wait(cmd)?;
                submissions += 1;
                debug!("profile batch {} submitted", submissions);
            }
        }
        let elapsed = start.elapsed();

        destinations.deinit();
        sources.deinit();
        info!(
            "profile {} done: {} copies in {} submissions over {:.2}s",
            kind,
            copies,
            submissions,
            elapsed.as_secs_f64()
        );
        Ok(ProfileSummary {
            kind,
            copies,
            submissions,
            elapsed,
            bytes_per_copy,
        })
    }

    /// One self-timed copy of `kind` at the smallest planned size.
    pub(super) fn dump_one<S, D>(
        &mut self,
        kind: TransferKind,
        source_tiling: Option<ImageTiling>,
        destinations: &[u32],
    ) -> BenchResult<DumpRecord>
    where
        S: Allocate,
        D: Allocate + CopyFrom<S>,
    {
        let config = self.config;
        let destination = destinations.first().copied().ok_or_else(|| {
            BenchError::InvalidConfig("no destination memory type configured".to_string())
        })?;
        let source_type = self.source_type(source_tiling)?;
        let plan = self.plan(source_type, 1, &[destination], config.min_size)?;

        let device = self.ctx.device().clone();
        let seed = self.ctx.next_seed();
        let mut source = ResourceGroup::<S>::init(
            1,
            &device,
            plan.cap,
            MemorySelector::Index(source_type),
            source_tiling.unwrap_or(ImageTiling::Linear),
            seed,
        )?;
        source.write_noise()?;
        let dst = D::allocate(
            &device,
            plan.cap,
            MemorySelector::Index(destination),
            ImageTiling::Linear,
        )?;

        let report = dst.copy_from(self.ctx, source.first(), None)?;
        let (cpu_ns, gpu_ns) = report
            .sample
            .map(|sample| (sample.cpu_ns, sample.gpu_ns()))
            .unwrap_or((0, None));
        info!(
            "dump {}: {} -> {} ({}), cpu {} ns, gpu {:?} ns",
            kind,
            source.first().memory_flags(),
            dst.memory_flags(),
            dst.describe().trim(),
            cpu_ns,
            gpu_ns
        );
        drop(dst);
        source.deinit();
        Ok(DumpRecord {
            kind,
            source_tiling,
            bytes: report.bytes,
            cpu_ns,
            gpu_ns,
        })
    }
}
