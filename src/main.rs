//! perf-profiler - version 0.1.0
//!
//! Performance profiler driver with tracing logging.
//! This is the main entry point that resolves configuration and handles subcommands.

mod cli;
mod commands;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing::level_filters::LevelFilter;

use cli::{Args, Commands, LogLevel};
use commands::{command_generate, command_run, show_config, RunOptions};
use perf_profiler::{load_config, AppConfig};

/// Initializes tracing logging subsystem with configured log level.
///
/// The CLI level wins over the config file; both fall back to `info`.
fn setup_logging(config: &AppConfig, args: &Args) -> anyhow::Result<()> {
    let level = args
        .log_level
        .clone()
        .or_else(|| {
            config
                .log_level
                .as_deref()
                .and_then(|s| LogLevel::from_str(s, true).ok())
        })
        .unwrap_or(LogLevel::Info);

    let max_level = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Loads the config file and applies CLI overrides (CLI > config > defaults).
fn resolve_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let profiler = &mut config.profiler;
    if let Some(n) = args.top_n_per_category {
        profiler.top_n_stats_per_category = n;
    }
    if let Some(n) = args.top_n_per_subcategory {
        profiler.top_n_stats_per_subcategory = n;
    }
    if let Some(n) = args.periodic_buffer_size {
        profiler.periodic_collection_buffer_size = n;
    }
    if let Some(n) = args.max_user_switch_events {
        profiler.max_user_switch_events = n;
    }
    if let Some(path) = &args.replay_file {
        config.replay_file = Some(path.clone());
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    // Early exit for show/check modes
    if args.check_config {
        if let Err(e) = config.validate() {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }
    if args.show_config {
        return show_config(&config, &args.config_format);
    }

    config.validate().context("Configuration invalid")?;
    setup_logging(&config, &args)?;

    match args.command {
        Some(Commands::Generate {
            output,
            polls,
            packages,
        }) => command_generate(output, polls, &packages),

        Some(Commands::Run {
            iterations,
            interval_ms,
            user_switch,
            wake_up,
            custom,
            filter_packages,
            format,
            output,
        }) => {
            let options = RunOptions {
                iterations,
                interval_ms,
                user_switch,
                wake_up,
                custom: custom || !filter_packages.is_empty(),
                filter_packages,
                format,
                output,
            };
            command_run(&config, options).await
        }

        None => {
            // Without a subcommand, run until Ctrl-C with the text report.
            let options = RunOptions {
                iterations: None,
                interval_ms: None,
                user_switch: None,
                wake_up: false,
                custom: false,
                filter_packages: Vec::new(),
                format: cli::DumpFormat::Text,
                output: None,
            };
            command_run(&config, options).await
        }
    }
}
