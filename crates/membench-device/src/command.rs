//! Portable command recording.
//!
//! A [`CommandBuffer`] is a plain list of [`Command`]s obtained from
//! [`GpuDevice::begin_command_buffer`](crate::GpuDevice::begin_command_buffer)
//! and handed back through
//! [`GpuDevice::submit_and_wait`](crate::GpuDevice::submit_and_wait).
//! Image layout transitions are the device's business and are never recorded
//! explicitly.

use std::fmt;

use crate::resource::{Extent2D, ResourceId};

/// Handle identifying one recorded command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandBufferId(pub u64);

impl fmt::Display for CommandBufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmdbuf#{}", self.0)
    }
}

/// Handle of a timestamp query pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryPoolId(pub u64);

impl fmt::Display for QueryPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "querypool#{}", self.0)
    }
}

/// Pipeline stage at which a timestamp is latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Before any preceding work starts.
    TopOfPipe,
    /// After transfer work.
    Transfer,
    /// After all preceding work completes.
    BottomOfPipe,
}

/// A single recorded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ResetQueries {
        pool: QueryPoolId,
        first: u32,
        count: u32,
    },
    WriteTimestamp {
        pool: QueryPoolId,
        slot: u32,
        stage: PipelineStage,
    },
    CopyBuffer {
        src: ResourceId,
        dst: ResourceId,
        size: u64,
    },
    CopyBufferToImage {
        src: ResourceId,
        dst: ResourceId,
        extent: Extent2D,
    },
    CopyImageToBuffer {
        src: ResourceId,
        dst: ResourceId,
        extent: Extent2D,
    },
    CopyImage {
        src: ResourceId,
        dst: ResourceId,
        extent: Extent2D,
    },
}

impl Command {
    /// True for the copy variants.
    pub fn is_copy(&self) -> bool {
        !matches!(self, Self::ResetQueries { .. } | Self::WriteTimestamp { .. })
    }
}

/// A recorded, not yet submitted, list of commands.
#[derive(Debug)]
pub struct CommandBuffer {
    id: CommandBufferId,
    label: String,
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Start an empty command buffer. Devices call this from
    /// `begin_command_buffer`.
    pub fn new(id: CommandBufferId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn id(&self) -> CommandBufferId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of copy commands recorded.
    pub fn copy_count(&self) -> usize {
        self.commands.iter().filter(|cmd| cmd.is_copy()).count()
    }

    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn reset_queries(&mut self, pool: QueryPoolId, first: u32, count: u32) {
        self.record(Command::ResetQueries { pool, first, count });
    }

    pub fn write_timestamp(&mut self, pool: QueryPoolId, slot: u32, stage: PipelineStage) {
        self.record(Command::WriteTimestamp { pool, slot, stage });
    }

    pub fn copy_buffer(&mut self, src: ResourceId, dst: ResourceId, size: u64) {
        self.record(Command::CopyBuffer { src, dst, size });
    }

    pub fn copy_buffer_to_image(&mut self, src: ResourceId, dst: ResourceId, extent: Extent2D) {
        self.record(Command::CopyBufferToImage { src, dst, extent });
    }

    pub fn copy_image_to_buffer(&mut self, src: ResourceId, dst: ResourceId, extent: Extent2D) {
        self.record(Command::CopyImageToBuffer { src, dst, extent });
    }

    pub fn copy_image(&mut self, src: ResourceId, dst: ResourceId, extent: Extent2D) {
        self.record(Command::CopyImage { src, dst, extent });
    }

    /// Consume the buffer, yielding its commands.
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
