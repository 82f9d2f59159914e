//! Test-matrix orchestration.
//!
//! For every transfer kind (and, for image sources, every source tiling):
//!
//! 1. Resolve the source memory type and plan the largest safe size
//! 2. Allocate the source group at that size and fill it with noise
//! 3. For each (size, destination type) cell: allocate the destination, run
//!    `loops` timed copies, reduce the samples, drop the destination
//! 4. Drop the source group
//!
//! Profile mode and dump mode replace the sweep with a single kind run
//! back-to-back or a single copy per kind.

mod profile;
mod sizes;

use membench_device::{DeviceInfo, ImageTiling, MemoryPropertyFlags, MemorySelector};
use tracing::{debug, info, warn};

pub use profile::{DumpRecord, ProfileSummary};
pub use sizes::{clamp_sizes, resolve_destinations, sweep_sizes};

use crate::config::{BenchConfig, TransferKind};
use crate::context::BenchContext;
use crate::error::{BenchError, BenchResult};
use crate::planner::{CapacityPlan, HeapCapacityPlanner, SourceFootprint};
use crate::report::{ResultRow, ResultSection, ResultsTable};
use crate::resource::{Allocate, Buffer, CopyFrom, Image, Resource, ResourceGroup};
use crate::stats::ChannelEstimates;

/// What a run produced.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Matrix results.
    Table(ResultsTable),
    /// Profile mode finished; nothing was recorded.
    Profiled(ProfileSummary),
    /// Dump mode finished.
    Dumped(Vec<DumpRecord>),
}

/// Source tilings measured for a kind.
fn source_tilings(kind: TransferKind) -> &'static [Option<ImageTiling>] {
    if kind.source_is_image() {
        &[Some(ImageTiling::Optimal), Some(ImageTiling::Linear)]
    } else {
        &[None]
    }
}

/// Section heading, e.g. `image (optimal) -> buffer`.
fn section_title(kind: TransferKind, source_tiling: Option<ImageTiling>) -> String {
    let source = match source_tiling {
        Some(tiling) => format!("image ({})", tiling),
        None => "buffer".to_string(),
    };
    let destination = if kind.destination_is_image() {
        "image (linear)"
    } else {
        "buffer"
    };
    format!("{} -> {}", source, destination)
}

/// Drives a benchmark run against one device.
#[derive(Debug)]
pub struct TestMatrix<'a> {
    ctx: &'a mut BenchContext,
    config: &'a BenchConfig,
}

impl<'a> TestMatrix<'a> {
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation.
    pub fn new(ctx: &'a mut BenchContext, config: &'a BenchConfig) -> BenchResult<Self> {
        config.validate()?;
        Ok(Self { ctx, config })
    }

    /// Run profile mode, dump mode, or the full matrix, in that priority.
    pub fn run(&mut self) -> BenchResult<RunOutcome> {
        if let Some(kind) = self.config.profile {
            return self.run_profile(kind).map(RunOutcome::Profiled);
        }
        if self.config.dump {
            return self.run_dump().map(RunOutcome::Dumped);
        }
        self.run_matrix().map(RunOutcome::Table)
    }

    /// Sweep every configured kind.
    pub fn run_matrix(&mut self) -> BenchResult<ResultsTable> {
        let mut table = ResultsTable::new(self.ctx.info().name.clone(), self.config.unit);
        let destinations = resolve_destinations(self.ctx.layout(), &self.config.destination_flags)?;
        for &kind in &self.config.kinds {
            for &tiling in source_tilings(kind) {
                info!("running {} ({})", kind, section_title(kind, tiling));
                let section = match kind {
                    TransferKind::BufferToBuffer => {
                        self.run_section::<Buffer, Buffer>(kind, tiling, &destinations)?
                    }
                    TransferKind::BufferToImage => {
                        self.run_section::<Buffer, Image>(kind, tiling, &destinations)?
                    }
                    TransferKind::ImageToBuffer => {
                        self.run_section::<Image, Buffer>(kind, tiling, &destinations)?
                    }
                    TransferKind::ImageToImage => {
                        self.run_section::<Image, Image>(kind, tiling, &destinations)?
                    }
                };
                table.push_section(section);
            }
        }
        info!("matrix complete: {} rows", table.row_count());
        Ok(table)
    }

    /// Source memory type index for a kind and tiling.
    fn source_type(&self, source_tiling: Option<ImageTiling>) -> BenchResult<u32> {
        let layout = self.ctx.layout();
        let filter = match source_tiling {
            Some(ImageTiling::Optimal) => layout.types_with(MemoryPropertyFlags::DEVICE_LOCAL),
            _ => layout.all_types_filter(),
        };
        Ok(layout.resolve(MemorySelector::Flags(self.config.source_flags), filter)?)
    }

    /// Plan the largest size for `element_count` sources on `source_type`'s
    /// heap plus one allocation per entry of `destinations`.
    fn plan(
        &self,
        source_type: u32,
        element_count: usize,
        destinations: &[u32],
        requested: u64,
    ) -> BenchResult<CapacityPlan> {
        let info = self.ctx.info();
        let source = SourceFootprint {
            heap_index: info.memory.heap_of_type(source_type)?,
            element_count: u32::try_from(element_count).map_err(|_| {
                BenchError::InvalidConfig(format!("group size {} too large", element_count))
            })?,
        };
        HeapCapacityPlanner::new(&info.memory, info.max_allocation_size)
            .with_headroom(self.config.headroom)
            .plan(source, destinations, requested)
    }

    fn run_section<S, D>(
        &mut self,
        kind: TransferKind,
        source_tiling: Option<ImageTiling>,
        destinations: &[u32],
    ) -> BenchResult<ResultSection>
    where
        S: Allocate,
        D: Allocate + CopyFrom<S>,
    {
        let config = self.config;
        let source_type = self.source_type(source_tiling)?;
        let plan = self.plan(source_type, config.group_size, destinations, config.max_size)?;

        let info: DeviceInfo = self.ctx.info().clone();
        let sizes = cell_sizes::<D>(config, plan.cap, &info);
        debug!("{}: cap {} bytes, sizes {:?}", kind, plan.cap, sizes);

        let seed = self.ctx.next_seed();
        let mut sources = ResourceGroup::<S>::init(
            config.group_size,
            self.ctx.device(),
            plan.cap,
            MemorySelector::Index(source_type),
            source_tiling.unwrap_or(ImageTiling::Linear),
            seed,
        )?;
        sources.write_noise()?;

        let mut section = ResultSection::new(section_title(kind, source_tiling), kind);
        for &size in &sizes {
            for &destination in destinations {
                let row = self.measure_cell::<S, D>(kind, &mut sources, size, destination)?;
                section.push(row);
            }
        }
        sources.deinit();
        Ok(section)
    }

    /// Allocate one destination and time `loops` copies into it.
    fn measure_cell<S, D>(
        &mut self,
        kind: TransferKind,
        sources: &mut ResourceGroup<S>,
        size: u64,
        destination: u32,
    ) -> BenchResult<ResultRow>
    where
        S: Allocate,
        D: Allocate + CopyFrom<S>,
    {
        let dst = D::allocate(
            self.ctx.device(),
            size,
            MemorySelector::Index(destination),
            ImageTiling::Linear,
        )?;
        let mut samples = Vec::with_capacity(self.config.loops);
        let mut bytes = 0;
        for _ in 0..self.config.loops {
            let src = sources.random_pick();
            let report = dst.copy_from(self.ctx, src, None)?;
            bytes = report.bytes;
            samples.extend(report.sample);
        }

        let estimates = ChannelEstimates::from_samples(bytes, &samples, self.config.unit)?;
        let source = sources.first();
        let row = ResultRow {
            index: 0,
            kind,
            size_label: dst.describe(),
            bytes,
            src_type: source.memory_type_index(),
            src_pool: source.memory_flags().short_name(),
            dst_type: destination,
            dst_pool: dst.memory_flags().short_name(),
            samples: samples.len(),
            cpu: estimates.cpu,
            gpu: estimates.gpu,
        };
        if row.cpu.cov.is_infinite() || row.gpu.cov.is_infinite() {
            warn!(
                "{} {} -> {}: median speed is zero, CoV undefined",
                kind, row.src_pool, row.dst_pool
            );
        }
        debug!(
            "{} {} {} -> {}: cpu {:.3} gpu {:.3} {}",
            kind,
            row.size_label.trim(),
            row.src_pool,
            row.dst_pool,
            row.cpu.median,
            row.gpu.median,
            self.config.unit
        );
        Ok(row)
    }

    fn run_profile(&mut self, kind: TransferKind) -> BenchResult<ProfileSummary> {
        match kind {
            TransferKind::BufferToBuffer => self.profile::<Buffer, Buffer>(kind),
            TransferKind::BufferToImage => self.profile::<Buffer, Image>(kind),
            TransferKind::ImageToBuffer => self.profile::<Image, Buffer>(kind),
            TransferKind::ImageToImage => self.profile::<Image, Image>(kind),
        }
    }

    fn run_dump(&mut self) -> BenchResult<Vec<DumpRecord>> {
        let destinations = resolve_destinations(self.ctx.layout(), &self.config.destination_flags)?;
        let mut records = Vec::new();
        for &kind in &self.config.kinds {
            for &tiling in source_tilings(kind) {
                let record = match kind {
                    TransferKind::BufferToBuffer => {
                        self.dump_one::<Buffer, Buffer>(kind, tiling, &destinations)?
                    }
                    TransferKind::BufferToImage => {
                        self.dump_one::<Buffer, Image>(kind, tiling, &destinations)?
                    }
                    TransferKind::ImageToBuffer => {
                        self.dump_one::<Image, Buffer>(kind, tiling, &destinations)?
                    }
                    TransferKind::ImageToImage => {
                        self.dump_one::<Image, Image>(kind, tiling, &destinations)?
                    }
                };
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Cell sizes for destination type `D`: the sweep clamped to `cap`, mapped
/// to the bytes `D` would occupy, without duplicates.
fn cell_sizes<D: Allocate>(config: &BenchConfig, cap: u64, info: &DeviceInfo) -> Vec<u64> {
    let swept = sweep_sizes(config.min_size, config.max_size, config.size_steps);
    let mut sizes: Vec<u64> = clamp_sizes(&swept, cap)
        .into_iter()
        .map(|size| D::footprint(size, info))
        .collect();
    sizes.dedup();
    sizes
}
