//! CLI command implementations for perf-profiler.
//!
//! This module provides implementations for all CLI subcommands:
//! - `run`: Drive collections and print the report
//! - `generate`: Replay file generation
//! - `config`: Printing the effective configuration

pub mod config;
pub mod generate;
pub mod run;

// Re-export command functions
pub use config::show_config;
pub use generate::command_generate;
pub use run::{command_run, RunOptions};
