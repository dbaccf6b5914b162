//! Run command implementation.
//!
//! Drives the profiler the way a collection service would: one boot-time
//! poll, optional user-switch and wake-up polls, then periodic polls on a
//! timer until the iteration limit or Ctrl-C. The report is written last.

use ahash::AHashSet as HashSet;
use anyhow::Context;
use chrono::Utc;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};

use perf_profiler::{
    generate_replay, AppConfig, PerformanceProfiler, ProcStatSource, ReplaySource, SystemState,
    UidStatsSource,
};

use crate::cli::DumpFormat;

// Synthetic data used when no replay file is configured
const SYNTHETIC_POLLS: usize = 16;
const SYNTHETIC_PACKAGES: [&str; 4] = [
    "com.android.car.media",
    "com.android.car.radio",
    "com.example.maps",
    "system_server",
];

/// Options of the `run` subcommand.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub iterations: Option<usize>,
    pub interval_ms: Option<u64>,
    pub user_switch: Option<(u32, u32)>,
    pub wake_up: bool,
    pub custom: bool,
    pub filter_packages: Vec<String>,
    pub format: DumpFormat,
    pub output: Option<PathBuf>,
}

fn build_source(config: &AppConfig) -> anyhow::Result<ReplaySource> {
    match &config.replay_file {
        Some(path) => ReplaySource::from_file(path)
            .with_context(|| format!("Failed to load replay file {}", path.display())),
        None => {
            let packages: Vec<String> = SYNTHETIC_PACKAGES.iter().map(|p| p.to_string()).collect();
            info!("No replay file configured, using {} generated polls", SYNTHETIC_POLLS);
            Ok(ReplaySource::from(generate_replay(SYNTHETIC_POLLS, &packages)))
        }
    }
}

fn write_report(
    profiler: &PerformanceProfiler,
    config: &AppConfig,
    options: &RunOptions,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match options.format {
        DumpFormat::Text => {
            profiler.on_dump(out)?;
            if options.custom {
                profiler.on_custom_collection_dump(Some(&mut *out))?;
            }
        }
        DumpFormat::Json => {
            profiler.on_dump_json(&config.intervals, &mut *out)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Runs collections and writes the report.
pub async fn command_run(config: &AppConfig, options: RunOptions) -> anyhow::Result<()> {
    let profiler = PerformanceProfiler::new(config.profiler.clone());
    profiler.init()?;

    let source = Arc::new(build_source(config)?);
    let uid_source: Arc<dyn UidStatsSource> = source.clone();
    let proc_source: Arc<dyn ProcStatSource> = source;
    let uid = Arc::downgrade(&uid_source);
    let proc = Arc::downgrade(&proc_source);

    profiler.on_system_startup()?;
    profiler
        .on_boottime_collection(Utc::now(), &uid, &proc)
        .context("Boot-time collection failed")?;

    if let Some((from, to)) = options.user_switch {
        profiler
            .on_user_switch_collection(Utc::now(), from, to, &uid, &proc)
            .context("User-switch collection failed")?;
    }
    if options.wake_up {
        profiler
            .on_wake_up_collection(Utc::now(), &uid, &proc)
            .context("Wake-up collection failed")?;
    }

    let filter_packages: HashSet<String> = options.filter_packages.iter().cloned().collect();
    let interval_ms = options
        .interval_ms
        .unwrap_or(config.intervals.periodic_interval_millis)
        .max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    // The first tick completes immediately.
    ticker.tick().await;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "Starting periodic collection every {} ms{}",
        interval_ms,
        options
            .iterations
            .map(|n| format!(" for {} polls", n))
            .unwrap_or_default()
    );

    let mut completed = 0usize;
    while options.iterations.map_or(true, |n| completed < n) {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                if let Err(e) = profiler.on_periodic_collection(now, SystemState::NormalMode, &uid, &proc) {
                    warn!("Periodic collection failed: {}", e);
                }
                if options.custom {
                    if let Err(e) = profiler.on_custom_collection(
                        now,
                        SystemState::NormalMode,
                        &filter_packages,
                        &uid,
                        &proc,
                    ) {
                        warn!("Custom collection failed: {}", e);
                    }
                }
                completed += 1;
                debug!("Completed periodic poll {}", completed);
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Received SIGINT (Ctrl+C), stopping collection...");
                break;
            }
        }
    }

    match &options.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create report file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_report(&profiler, config, &options, &mut out)?;
            info!("Wrote report to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&profiler, config, &options, &mut out)?;
        }
    }

    if options.custom {
        profiler.on_custom_collection_dump(None)?;
    }
    profiler.terminate();
    Ok(())
}
