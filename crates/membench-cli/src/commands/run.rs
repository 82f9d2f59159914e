//! `membench run`: the bandwidth matrix, profile mode or dump mode.
//!
//! # Usage
//!
//! ```bash
//! # Full matrix on the first device, text table on stdout
//! membench run
//!
//! # One kind, one size, JSON report to a file
//! membench run --kind buf2buf --min-size 256 --max-size 256 --format json --output report.json
//!
//! # Keep the copy engine busy for 30 s under an external profiler
//! membench run --profile img2buf --profile-seconds 30
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use tracing::{error, info};

use membench_core::constants::MIB;
use membench_core::{
    BenchConfig, BenchContext, BenchError, DumpRecord, ProfileSummary, ReportFormat, ResultsTable, RunOutcome,
    SpeedUnit, TestMatrix, TransferKind,
};
use membench_device::sim::{SimConfig, SimDevice};

use crate::error::{exit_code_for_error, CliError, CliExitCode, CliResult};

/// Output format of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

/// Throughput unit on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    /// Binary gigabytes (2^30 bytes)
    Gib,
    /// Decimal gigabytes (10^9 bytes)
    Gb,
}

impl From<UnitArg> for SpeedUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Gib => SpeedUnit::GiB,
            UnitArg::Gb => SpeedUnit::GB,
        }
    }
}

fn parse_kind(s: &str) -> Result<TransferKind, String> {
    s.parse::<TransferKind>().map_err(|e| e.to_string())
}

/// Arguments for the run command.
///
/// Options left unset keep the value from `--config`, or the built-in
/// default when no file is given.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Device index (see `membench list`)
    #[arg(short, long)]
    pub device: Option<u32>,

    /// Timed iterations per cell
    #[arg(short, long)]
    pub loops: Option<usize>,

    /// Source resources cycled per test
    #[arg(short, long)]
    pub group_size: Option<usize>,

    /// Smallest test size in MiB
    #[arg(long, value_name = "MIB")]
    pub min_size: Option<u64>,

    /// Largest test size in MiB
    #[arg(long, value_name = "MIB")]
    pub max_size: Option<u64>,

    /// Intervals between min and max size
    #[arg(long)]
    pub steps: Option<usize>,

    /// Transfer kind to run; repeat for several (buf2buf, buf2img, img2buf, img2img)
    #[arg(short, long = "kind", value_parser = parse_kind)]
    pub kinds: Vec<TransferKind>,

    /// Run profile mode for this kind instead of the matrix
    #[arg(long, value_parser = parse_kind, value_name = "KIND")]
    pub profile: Option<TransferKind>,

    /// Profile mode duration in seconds
    #[arg(long)]
    pub profile_seconds: Option<f64>,

    /// Issue one copy per kind and exit
    #[arg(long)]
    pub dump: bool,

    /// Throughput unit
    #[arg(long, value_enum)]
    pub unit: Option<UnitArg>,

    /// Seed for resource picking, noise content and the simulator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of each heap the planner may fill
    #[arg(long)]
    pub headroom: Option<f64>,

    /// Report format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not pace the simulator to modeled GPU time (CPU columns become
    /// submission overhead only)
    #[arg(long)]
    pub no_realtime: bool,

    /// Simulator timing jitter as a fraction (0 disables noise)
    #[arg(long)]
    pub jitter: Option<f64>,
}

impl RunArgs {
    /// Merge the arguments over the config file or defaults and validate.
    pub fn build_config(&self) -> CliResult<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_json_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(device) = self.device {
            config.device_index = device;
        }
        if let Some(loops) = self.loops {
            config.loops = loops;
        }
        if let Some(group_size) = self.group_size {
            config.group_size = group_size;
        }
        if let Some(min) = self.min_size {
            config.min_size = mib_to_bytes("min-size", min)?;
        }
        if let Some(max) = self.max_size {
            config.max_size = mib_to_bytes("max-size", max)?;
        }
        if let Some(steps) = self.steps {
            config.size_steps = steps;
        }
        if !self.kinds.is_empty() {
            config.kinds = self.kinds.clone();
        }
        if self.profile.is_some() {
            config.profile = self.profile;
        }
        if let Some(seconds) = self.profile_seconds {
            config.profile_seconds = seconds;
        }
        config.dump |= self.dump;
        if let Some(unit) = self.unit {
            config.unit = unit.into();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(headroom) = self.headroom {
            config.headroom = headroom;
        }
        config.validate()?;
        Ok(config)
    }

    fn sim_config(&self, config: &BenchConfig) -> SimConfig {
        let mut sim = SimConfig::default().with_realtime(!self.no_realtime);
        if let Some(seed) = config.seed {
            sim = sim.with_seed(seed);
        }
        if let Some(jitter) = self.jitter {
            sim = sim.with_jitter(jitter);
        }
        sim
    }
}

fn mib_to_bytes(flag: &str, mib: u64) -> CliResult<u64> {
    mib.checked_mul(MIB).ok_or_else(|| {
        BenchError::InvalidConfig(format!("--{} {} MiB overflows a byte count", flag, mib)).into()
    })
}

/// Execute the run command.
///
/// # Returns
///
/// Exit code:
/// - 0: Success
/// - 1: Device or allocation failure, or the report could not be written
/// - 2: Invalid configuration
pub fn handle_run(args: RunArgs) -> i32 {
    match run(&args) {
        Ok(()) => CliExitCode::Success.into(),
        Err(e) => {
            error!("{}", e);
            exit_code_for_error(&e).into()
        }
    }
}

fn run(args: &RunArgs) -> CliResult<()> {
    let config = args.build_config()?;
    let device = SimDevice::open(config.device_index, args.sim_config(&config))?;
    let mut ctx = BenchContext::new(Arc::new(device), config.seed)?;
    let outcome = TestMatrix::new(&mut ctx, &config)?.run()?;

    let format = args.format.unwrap_or(OutputFormat::Text);
    match outcome {
        RunOutcome::Table(table) => emit_table(&table, format, args.output.as_deref()),
        RunOutcome::Profiled(summary) => emit(&profile_text(&summary), format, &summary, args),
        RunOutcome::Dumped(records) => emit(&dump_text(&records), format, &records, args),
    }
}

fn emit_table(
    table: &ResultsTable,
    format: OutputFormat,
    output: Option<&Path>,
) -> CliResult<()> {
    match output {
        Some(path) => {
            table
                .write_to_file(format.into(), path)
                .map_err(|source| CliError::Output {
                    path: path.display().to_string(),
                    source,
                })?;
            info!("report written to {}", path.display());
        }
        None => print!("{}", table.render(format.into())?),
    }
    Ok(())
}

fn emit<T: serde::Serialize + ?Sized>(
    text: &str,
    format: OutputFormat,
    value: &T,
    args: &RunArgs,
) -> CliResult<()> {
    let content = match format {
        OutputFormat::Text => text.to_string(),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(value)?),
    };
    match &args.output {
        Some(path) => std::fs::write(path, content).map_err(|source| CliError::Output {
            path: path.display().to_string(),
            source,
        }),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn profile_text(summary: &ProfileSummary) -> String {
    format!(
        "profile {}: {} copies of {} bytes in {} submissions, {:.2}s\n",
        summary.kind,
        summary.copies,
        summary.bytes_per_copy,
        summary.submissions,
        summary.elapsed.as_secs_f64()
    )
}

fn dump_text(records: &[DumpRecord]) -> String {
    records
        .iter()
        .map(|record| {
            let tiling = record
                .source_tiling
                .map(|tiling| format!(" ({})", tiling))
                .unwrap_or_default();
            let gpu = record
                .gpu_ns
                .map(|ns| format!("{} ns", ns))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "dump {}{}: {} bytes, cpu {} ns, gpu {}\n",
                record.kind, tiling, record.bytes, record.cpu_ns, gpu
            )
        })
        .collect()
}
