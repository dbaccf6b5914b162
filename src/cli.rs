//! CLI arguments and subcommands for perf-profiler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Report format written after a run
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DumpFormat {
    Text,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "perf-profiler",
    about = "Ranks per-UID resource usage into bounded performance collections",
    long_about = "Ranks per-UID resource usage into bounded performance collections.\n\n\
                  Aggregates CPU, storage I/O, I/O-blocked task and major page fault deltas \
                  into top-N rankings for boot-time, periodic, user-switch, wake-up and custom \
                  collection events, and prints them as a text or JSON report.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Entries kept per ranked category (override config)
    #[arg(long)]
    pub top_n_per_category: Option<usize>,

    /// Processes kept inside each ranked entry (override config)
    #[arg(long)]
    pub top_n_per_subcategory: Option<usize>,

    /// Capacity of the periodic collection (override config)
    #[arg(long)]
    pub periodic_buffer_size: Option<usize>,

    /// User-switch events retained (override config)
    #[arg(long)]
    pub max_user_switch_events: Option<usize>,

    /// Path to a JSON replay file (uses generated data when absent)
    #[arg(short = 'r', long)]
    pub replay_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run collections against the replay source and print the report
    Run {
        /// Stop after this many periodic polls (runs until Ctrl-C when absent)
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Periodic poll interval in milliseconds (override config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Record a user switch before polling, as FROM:TO
        #[arg(long, value_parser = parse_user_switch)]
        user_switch: Option<(u32, u32)>,

        /// Record a wake-up collection before polling
        #[arg(long)]
        wake_up: bool,

        /// Also record a custom collection on every periodic poll
        #[arg(long)]
        custom: bool,

        /// Packages kept by the custom collection (comma-separated)
        #[arg(long, value_delimiter = ',')]
        filter_packages: Vec<String>,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: DumpFormat,

        /// Write the report to this file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Generate a synthetic replay JSON file
    Generate {
        /// Output file path
        #[arg(short = 'o', long, default_value = "replay.json")]
        output: PathBuf,

        /// Number of polls to generate
        #[arg(long, default_value_t = 10)]
        polls: usize,

        /// Package names to generate UIDs for (comma-separated)
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "com.android.car.media,com.android.car.radio,com.example.maps,system_server"
        )]
        packages: Vec<String>,
    },
}

/// Parses a `FROM:TO` user switch.
fn parse_user_switch(value: &str) -> Result<(u32, u32), String> {
    let (from, to) = value
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{}'", value))?;
    let from = from
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid FROM user '{}': {}", from, e))?;
    let to = to
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid TO user '{}': {}", to, e))?;
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_switch() {
        assert_eq!(parse_user_switch("0:10"), Ok((0, 10)));
        assert_eq!(parse_user_switch(" 10 : 11 "), Ok((10, 11)));
        assert!(parse_user_switch("10").is_err());
        assert!(parse_user_switch("a:1").is_err());
    }

    #[test]
    fn test_run_arguments() {
        let args = Args::parse_from([
            "perf-profiler",
            "--top-n-per-category",
            "3",
            "run",
            "-n",
            "2",
            "--user-switch",
            "0:10",
            "--filter-packages",
            "a,b",
            "--format",
            "json",
        ]);
        assert_eq!(args.top_n_per_category, Some(3));
        match args.command {
            Some(Commands::Run {
                iterations,
                user_switch,
                filter_packages,
                format,
                ..
            }) => {
                assert_eq!(iterations, Some(2));
                assert_eq!(user_switch, Some((0, 10)));
                assert_eq!(filter_packages, vec!["a".to_string(), "b".to_string()]);
                assert!(matches!(format, DumpFormat::Json));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
