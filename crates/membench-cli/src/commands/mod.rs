//! Subcommand handlers. Each returns the process exit code.

pub mod list;
pub mod run;
