//! membench CLI
//!
//! Measures GPU memory-copy bandwidth between memory pools and prints a
//! results table.
//!
//! # Commands
//!
//! - `run`: bandwidth matrix, or profile/dump mode
//! - `list`: devices and their memory heaps and types
//!
//! Logs go to stderr so stdout carries only the report.
//!
//! # Exit Codes
//! - 0: success
//! - 1: device, allocation or I/O failure
//! - 2: invalid configuration

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

pub use error::{exit_code_for_error, CliError, CliExitCode};

/// membench - GPU memory bandwidth benchmark
#[derive(Parser, Debug)]
#[command(name = "membench")]
#[command(version)]
#[command(about = "Measure GPU memory-copy bandwidth between memory pools")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bandwidth test matrix
    ///
    /// Sweeps every selected transfer kind over the configured sizes and
    /// destination memory pools, timing each copy on the CPU and the GPU.
    /// `--profile` and `--dump` replace the sweep.
    Run(commands::run::RunArgs),
    /// List devices with their memory heaps and types
    List,
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Run(args) => commands::run::handle_run(args),
        Commands::List => commands::list::handle_list(),
    };

    std::process::exit(exit_code);
}
