//! Performance Profiler Library
//!
//! This library aggregates per-UID and system-wide resource usage deltas
//! into ranked, time-bounded performance collections. It is driven by an
//! external scheduler that calls one `on_*_collection` operation per poll,
//! and renders its collections as a text report or a structured dump.
//!
//! # Features
//!
//! - **Top-N Rankings**: CPU time, storage reads and writes, I/O-blocked
//!   tasks and major page faults, each with a per-process breakdown
//! - **Bounded Collections**: boot-time, periodic, user-switch, wake-up and
//!   custom collections, each with its own retention policy
//! - **Pluggable Sources**: stat sources are traits held through weak
//!   references, so their owner controls their lifetime
//! - **Thread-Safe**: every operation runs under a single lock
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use perf_profiler::{
//!     generate_replay, PerformanceProfiler, ProcStatSource, ProfilerConfig, ReplaySource,
//!     UidStatsSource,
//! };
//!
//! let profiler = PerformanceProfiler::new(ProfilerConfig::default());
//! profiler.init().unwrap();
//!
//! let replay = generate_replay(2, &["com.example.maps".to_string()]);
//! let source = Arc::new(ReplaySource::from(replay));
//! let uid_source: Arc<dyn UidStatsSource> = source.clone();
//! let proc_source: Arc<dyn ProcStatSource> = source;
//!
//! profiler
//!     .on_boottime_collection(
//!         Utc::now(),
//!         &Arc::downgrade(&uid_source),
//!         &Arc::downgrade(&proc_source),
//!     )
//!     .unwrap();
//!
//! let mut report = Vec::new();
//! profiler.on_dump(&mut report).unwrap();
//! assert!(String::from_utf8_lossy(&report).contains("Boot-time performance report"));
//! ```

pub mod collection;
pub mod config;
pub mod dump;
pub mod error;
pub mod package_stats;
pub mod profiler;
pub mod sources;
pub mod stats;
pub mod summary;

// Re-export main types for convenience
pub use collection::{CollectionInfo, UserSwitchCollectionInfo};
pub use config::{load_config, AppConfig, CollectionIntervals, ConfigError, ProfilerConfig};
pub use dump::PerformanceStats;
pub use error::ProfilerError;
pub use package_stats::{StatsView, UserPackageStats};
pub use profiler::{PerformanceProfiler, SystemState};
pub use sources::{generate_replay, load_replay_file, ReplayFile, ReplaySource};
pub use stats::{ProcStatInfo, ProcStatSource, UidStats, UidStatsSource};
pub use summary::{PerfStatsRecord, SystemSummaryStats, UserPackageSummaryStats};
