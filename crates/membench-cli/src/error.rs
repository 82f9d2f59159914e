//! CLI error type and exit codes.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Runtime failure (allocation, device, I/O) |
//! | 2 | Bad configuration or arguments |

use membench_core::BenchError;
use membench_device::DeviceError;
use thiserror::Error;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    Error = 1,
    Config = 2,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Bench(#[from] BenchError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// Map an error to the exit code the process should return.
pub fn exit_code_for_error(err: &CliError) -> CliExitCode {
    match err {
        CliError::Bench(e) if e.is_config_error() => CliExitCode::Config,
        CliError::Device(DeviceError::InvalidConfig(_))
        | CliError::Device(DeviceError::DeviceIndexOutOfRange { .. }) => CliExitCode::Config,
        _ => CliExitCode::Error,
    }
}
