//! Paired CPU/GPU interval timer.

use std::time::Instant;

use membench_device::{CommandBuffer, CommandBufferId, PipelineStage};

use super::query_pool::{QueryPool, QuerySlot};
use crate::error::BenchResult;

/// GPU side of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuTiming {
    /// No GPU work was timed (host-side copy).
    NotRecorded,
    /// Begin timestamp recorded, end not yet recorded.
    Started {
        begin: QuerySlot,
        command_buffer: CommandBufferId,
    },
    /// Both timestamps recorded, read-back outstanding.
    Pending {
        begin: QuerySlot,
        end: QuerySlot,
        command_buffer: CommandBufferId,
    },
    /// Read-back done; elapsed nanoseconds.
    Resolved(u64),
}

/// Convert a tick count to nanoseconds.
///
/// The multiply is skipped when the period is 1 within `f32::EPSILON`.
pub fn ticks_to_ns(ticks: u64, period: f32) -> u64 {
    if (period - 1.0).abs() < f32::EPSILON {
        ticks
    } else {
        (ticks as f64 * f64::from(period)).round() as u64
    }
}

/// Result of one timed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub cpu_ns: u64,
    pub gpu: GpuTiming,
}

impl TimingSample {
    /// Sample with known values, mainly for tests and replay.
    pub fn new(cpu_ns: u64, gpu_ns: Option<u64>) -> Self {
        Self {
            cpu_ns,
            gpu: gpu_ns.map_or(GpuTiming::NotRecorded, GpuTiming::Resolved),
        }
    }

    /// GPU nanoseconds, if resolved.
    pub fn gpu_ns(&self) -> Option<u64> {
        match self.gpu {
            GpuTiming::Resolved(ns) => Some(ns),
            _ => None,
        }
    }

    /// CPU time is non-zero and the GPU side is not waiting on read-back.
    pub fn is_valid(&self) -> bool {
        self.cpu_ns > 0
            && !matches!(self.gpu, GpuTiming::Started { .. } | GpuTiming::Pending { .. })
    }
}

/// Brackets one submission on the CPU and, optionally, the GPU.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use membench_core::timing::{QueryPool, Timer};
/// use membench_device::sim::{SimConfig, SimDevice, SimPreset};
/// use membench_device::GpuDevice;
///
/// let device: Arc<dyn GpuDevice> =
///     Arc::new(SimDevice::new(SimPreset::Discrete, SimConfig::default()).unwrap());
/// let mut pool = QueryPool::new(device.clone()).unwrap();
///
/// let mut timer = Timer::new(device.info().timestamp_period);
/// timer.cpu_begin();
/// let mut cmd = device.begin_command_buffer("empty").unwrap();
/// timer.gpu_begin(&mut pool, &mut cmd);
/// timer.gpu_end(&mut pool, &mut cmd);
/// device.submit_and_wait(cmd).unwrap();
/// timer.cpu_end();
/// timer.readback_gpu_timestamps(&pool).unwrap();
/// assert!(timer.sample().gpu_ns().is_some());
/// ```
#[derive(Debug)]
pub struct Timer {
    period: f32,
    cpu_start: Option<Instant>,
    cpu_ns: u64,
    gpu: GpuTiming,
}

impl Timer {
    /// `period` is the device's nanoseconds per timestamp tick.
    pub fn new(period: f32) -> Self {
        Self {
            period,
            cpu_start: None,
            cpu_ns: 0,
            gpu: GpuTiming::NotRecorded,
        }
    }

    pub fn cpu_begin(&mut self) {
        self.cpu_start = Some(Instant::now());
    }

    /// Stop the CPU clock. Without a prior `cpu_begin` this records zero.
    pub fn cpu_end(&mut self) {
        if let Some(start) = self.cpu_start.take() {
            // Never zero for a bracketed interval.
            self.cpu_ns = (start.elapsed().as_nanos() as u64).max(1);
        }
    }

    /// Record a pool reset and the top-of-pipe timestamp into `cmd`.
    pub fn gpu_begin(&mut self, pool: &mut QueryPool, cmd: &mut CommandBuffer) {
        pool.reset(cmd);
        let begin = pool.write_timestamp(cmd, PipelineStage::TopOfPipe);
        self.gpu = GpuTiming::Started {
            begin,
            command_buffer: cmd.id(),
        };
    }

    /// Record the bottom-of-pipe timestamp into `cmd`.
    ///
    /// # Panics
    ///
    /// When `gpu_begin` was not called on the same command buffer.
    pub fn gpu_end(&mut self, pool: &mut QueryPool, cmd: &mut CommandBuffer) {
        let (begin, command_buffer) = match self.gpu {
            GpuTiming::Started {
                begin,
                command_buffer,
            } => (begin, command_buffer),
            other => panic!("gpu_end without matching gpu_begin (state {:?})", other),
        };
        assert_eq!(
            command_buffer,
            cmd.id(),
            "gpu_end recorded into a different command buffer than gpu_begin"
        );
        let end = pool.write_timestamp(cmd, PipelineStage::BottomOfPipe);
        self.gpu = GpuTiming::Pending {
            begin,
            end,
            command_buffer,
        };
    }

    /// Read back and convert the GPU interval. Idempotent: only the first
    /// call after `gpu_end` touches the device.
    ///
    /// # Panics
    ///
    /// - The command buffer has not been submitted and waited on
    /// - The pool was reset by a later measurement
    /// - `gpu_begin` was recorded without `gpu_end`
    pub fn readback_gpu_timestamps(&mut self, pool: &QueryPool) -> BenchResult<()> {
        match self.gpu {
            GpuTiming::NotRecorded | GpuTiming::Resolved(_) => Ok(()),
            GpuTiming::Started { .. } => {
                panic!("readback_gpu_timestamps before gpu_end")
            }
            GpuTiming::Pending {
                begin,
                end,
                command_buffer,
            } => {
                assert!(
                    pool.is_complete(command_buffer),
                    "timestamps read before {} completed",
                    command_buffer
                );
                let ticks = pool.read_ticks(begin, end)?;
                let (first, last) = match (ticks.first(), ticks.last()) {
                    (Some(&first), Some(&last)) => (first, last),
                    _ => (0, 0),
                };
                self.gpu = GpuTiming::Resolved(ticks_to_ns(last.saturating_sub(first), self.period));
                Ok(())
            }
        }
    }

    pub fn cpu_ns(&self) -> u64 {
        self.cpu_ns
    }

    pub fn gpu(&self) -> GpuTiming {
        self.gpu
    }

    pub fn sample(&self) -> TimingSample {
        TimingSample {
            cpu_ns: self.cpu_ns,
            gpu: self.gpu,
        }
    }
}
