//! # membench core
//!
//! Measurement engine for GPU memory-bandwidth benchmarks. The engine copies
//! data between memory pools of a [`GpuDevice`](membench_device::GpuDevice)
//! and reports robust throughput estimates from both the CPU wall clock and
//! GPU timestamps.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`timing`] | CPU clock plus lazily read-back GPU timestamp pairs |
//! | [`resource`] | RAII buffers and images, randomly cycled resource groups |
//! | [`stats`] | Median and MAD-based coefficient of variation |
//! | [`planner`] | Largest test size that fits every memory heap |
//! | [`matrix`] | Kind x size x destination sweep, profile and dump modes |
//! | [`report`] | Plain-text and JSON result tables |
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use membench_core::{BenchConfig, BenchContext, RunOutcome, TestMatrix, TransferKind};
//! use membench_device::sim::{SimConfig, SimDevice, SimPreset};
//!
//! let device = SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(1)).unwrap();
//! let mut ctx = BenchContext::new(Arc::new(device), Some(1)).unwrap();
//! let config = BenchConfig::default()
//!     .with_kinds(&[TransferKind::BufferToBuffer])
//!     .with_group_size(2)
//!     .with_loops(5);
//!
//! let outcome = TestMatrix::new(&mut ctx, &config).unwrap().run().unwrap();
//! if let RunOutcome::Table(table) = outcome {
//!     assert_eq!(table.row_count(), 6);
//! }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod matrix;
pub mod planner;
pub mod report;
pub mod resource;
pub mod stats;
pub mod timing;

// Re-export key types for convenience
pub use config::{BenchConfig, SpeedUnit, TransferKind};
pub use context::BenchContext;
pub use error::{BenchError, BenchResult};
pub use matrix::{DumpRecord, ProfileSummary, RunOutcome, TestMatrix};
pub use planner::{CapacityPlan, HeapCapacityPlanner, HeapUsagePlan, SourceFootprint};
pub use report::{ReportFormat, ResultRow, ResultSection, ResultsTable};
pub use resource::{Buffer, CopyFrom, Image, Resource, ResourceGroup};
pub use stats::{ChannelEstimates, ThroughputEstimate};
pub use timing::{QueryPool, Timer, TimingSample};
