//! The performance profiler engine.
//!
//! [`PerformanceProfiler`] turns one poll of the stat sources into a
//! [`PerfStatsRecord`] and files it under the collection event that
//! triggered it. An external scheduler decides when each `on_*_collection`
//! call happens; the profiler only aggregates and caches.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use perf_profiler::{
//!     PerformanceProfiler, ProcStatSource, ProfilerConfig, ReplaySource, SystemState,
//!     UidStatsSource,
//! };
//!
//! let profiler = PerformanceProfiler::new(ProfilerConfig::default());
//! profiler.init().expect("first init");
//!
//! let source = Arc::new(ReplaySource::default());
//! let uid_source: Arc<dyn UidStatsSource> = source.clone();
//! let proc_source: Arc<dyn ProcStatSource> = source;
//!
//! profiler
//!     .on_periodic_collection(
//!         Utc::now(),
//!         SystemState::NormalMode,
//!         &Arc::downgrade(&uid_source),
//!         &Arc::downgrade(&proc_source),
//!     )
//!     .expect("sources are alive");
//! assert_eq!(profiler.periodic_collection().len(), 1);
//! ```

use ahash::AHashSet as HashSet;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

use crate::collection::{CollectionInfo, UserSwitchCollectionInfo};
use crate::config::{CollectionIntervals, ProfilerConfig};
use crate::dump::structured::{build_performance_stats, PerformanceStats};
use crate::dump::text;
use crate::error::ProfilerError;
use crate::stats::{ProcStatSource, UidStatsSource};
use crate::summary::{build_user_package_summary, PerfStatsRecord, SystemSummaryStats, TopNLimits};

/// Power state of the system when a poll happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    NormalMode,
    GarageMode,
}

/// Collection a poll is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Boottime,
    Periodic,
    WakeUp,
    Custom,
    LatestUserSwitch,
}

impl Bucket {
    fn name(self) -> &'static str {
        match self {
            Bucket::Boottime => "boot-time",
            Bucket::Periodic => "periodic",
            Bucket::WakeUp => "wake-up",
            Bucket::Custom => "custom",
            Bucket::LatestUserSwitch => "user-switch",
        }
    }
}

/// Mutable profiler state, guarded by a single mutex.
#[derive(Default)]
pub(crate) struct ProfilerState {
    initialized: bool,
    limits: Option<TopNLimits>,
    max_user_switch_events: usize,
    system_event_data_cache_duration: std::time::Duration,
    pub(crate) boottime: CollectionInfo,
    pub(crate) periodic: CollectionInfo,
    pub(crate) wake_up: CollectionInfo,
    pub(crate) custom: CollectionInfo,
    pub(crate) user_switch: VecDeque<UserSwitchCollectionInfo>,
    last_major_faults: u64,
}

impl ProfilerState {
    fn collection(&self, bucket: Bucket) -> Option<&CollectionInfo> {
        match bucket {
            Bucket::Boottime => Some(&self.boottime),
            Bucket::Periodic => Some(&self.periodic),
            Bucket::WakeUp => Some(&self.wake_up),
            Bucket::Custom => Some(&self.custom),
            Bucket::LatestUserSwitch => self.user_switch.back().map(|u| &u.collection),
        }
    }

    fn collection_mut(&mut self, bucket: Bucket) -> Option<&mut CollectionInfo> {
        match bucket {
            Bucket::Boottime => Some(&mut self.boottime),
            Bucket::Periodic => Some(&mut self.periodic),
            Bucket::WakeUp => Some(&mut self.wake_up),
            Bucket::Custom => Some(&mut self.custom),
            Bucket::LatestUserSwitch => self.user_switch.back_mut().map(|u| &mut u.collection),
        }
    }

    /// Fails when polling into `bucket` cannot store anything.
    fn check_capacity(&self, bucket: Bucket) -> Result<(), ProfilerError> {
        match self.collection(bucket) {
            Some(c) if c.max_cache_size() > 0 => Ok(()),
            Some(_) => Err(ProfilerError::InvalidConfig(format!(
                "Maximum cache size of the {} collection cannot be 0",
                bucket.name()
            ))),
            None => Err(ProfilerError::InvalidConfig(format!(
                "No {} collection to record into",
                bucket.name()
            ))),
        }
    }

    /// Pulls one poll from both sources and files it under `bucket`.
    fn process(
        &mut self,
        time: DateTime<Utc>,
        filter_packages: &HashSet<String>,
        uid_source: &dyn UidStatsSource,
        proc_source: &dyn ProcStatSource,
        bucket: Bucket,
    ) -> Result<(), ProfilerError> {
        self.check_capacity(bucket)?;
        let limits = self.limits.ok_or_else(|| {
            ProfilerError::InvalidConfig("Profiler is not initialized".into())
        })?;

        let uid_stats = uid_source.delta_stats();
        let user_summary = build_user_package_summary(
            &uid_stats,
            filter_packages,
            limits,
            &mut self.last_major_faults,
        );
        let system_summary = SystemSummaryStats::from(&proc_source.delta_stats());
        let record = PerfStatsRecord::new(time, system_summary, user_summary);

        debug!(
            "Recorded {} collection: {} UIDs, {} top CPU entries",
            bucket.name(),
            uid_stats.len(),
            record.user_package_summary_stats.top_n_cpu_times.len()
        );

        if let Some(collection) = self.collection_mut(bucket) {
            collection.push(record);
        }
        Ok(())
    }

    fn clear_expired_system_event_collections(&mut self, now: DateTime<Utc>) {
        let max_age =
            Duration::from_std(self.system_event_data_cache_duration).unwrap_or(Duration::MAX);
        if self.boottime.is_expired(now, max_age) {
            self.boottime.clear();
            info!("Cleared boot-time collection stats");
        }
        if self.wake_up.is_expired(now, max_age) {
            self.wake_up.clear();
            info!("Cleared wake-up collection stats");
        }
        if self
            .user_switch
            .front()
            .is_some_and(|u| u.collection.is_expired(now, max_age))
        {
            self.user_switch.pop_front();
            info!("Cleared the oldest user-switch event collection stats");
        }
    }
}

/// Upgrades both source handles, naming every one that is gone.
fn resolve_sources(
    uid_source: &Weak<dyn UidStatsSource>,
    proc_source: &Weak<dyn ProcStatSource>,
) -> Result<(Arc<dyn UidStatsSource>, Arc<dyn ProcStatSource>), ProfilerError> {
    match (uid_source.upgrade(), proc_source.upgrade()) {
        (Some(uid), Some(proc)) => Ok((uid, proc)),
        (uid, proc) => {
            let mut missing = Vec::new();
            if uid.is_none() {
                missing.push("Per-UID stats source is no longer available");
            }
            if proc.is_none() {
                missing.push("Proc stats source is no longer available");
            }
            Err(ProfilerError::UnavailableCollector(missing.join(", ")))
        }
    }
}

/// Collects and caches performance records for each collection event.
///
/// Every public operation holds the state lock for its whole duration.
pub struct PerformanceProfiler {
    config: ProfilerConfig,
    state: Mutex<ProfilerState>,
}

impl PerformanceProfiler {
    /// Creates an uninitialized profiler. Polls fail until [`init`] runs.
    ///
    /// [`init`]: PerformanceProfiler::init
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ProfilerState::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        "PerformanceProfiler"
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ProfilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sizes every collection from the configuration. Fails when called
    /// twice.
    pub fn init(&self) -> Result<(), ProfilerError> {
        let mut state = self.lock();
        if state.initialized {
            return Err(ProfilerError::AlreadyInitialized(self.name()));
        }
        state.initialized = true;
        state.limits = Some(TopNLimits {
            per_category: self.config.top_n_stats_per_category,
            per_subcategory: self.config.top_n_stats_per_subcategory,
        });
        state.max_user_switch_events = self.config.max_user_switch_events;
        state.system_event_data_cache_duration = self.config.system_event_data_cache_duration();
        state.boottime = CollectionInfo::unbounded();
        state.periodic = CollectionInfo::new(self.config.periodic_collection_buffer_size);
        state.wake_up = CollectionInfo::unbounded();
        state.custom = CollectionInfo::unbounded();
        info!(
            "Initialized {} (top-n per category: {}, periodic buffer: {})",
            self.name(),
            self.config.top_n_stats_per_category,
            self.config.periodic_collection_buffer_size
        );
        Ok(())
    }

    /// Drops every cached record. Later polls fail with `InvalidConfig`.
    pub fn terminate(&self) {
        let mut state = self.lock();
        warn!("Terminating {}", self.name());
        state.boottime = CollectionInfo::default();
        state.periodic = CollectionInfo::default();
        state.wake_up = CollectionInfo::default();
        state.custom = CollectionInfo::default();
        state.user_switch = VecDeque::new();
        state.max_user_switch_events = 0;
        state.limits = None;
    }

    /// Starts a new boot cycle by clearing the boot-time and wake-up data.
    pub fn on_system_startup(&self) -> Result<(), ProfilerError> {
        let mut state = self.lock();
        state.boottime.clear();
        state.wake_up.clear();
        info!("Cleared boot-time and wake-up collections on system startup");
        Ok(())
    }

    pub fn on_boottime_collection(
        &self,
        time: DateTime<Utc>,
        uid_source: &Weak<dyn UidStatsSource>,
        proc_source: &Weak<dyn ProcStatSource>,
    ) -> Result<(), ProfilerError> {
        let (uid, proc) = resolve_sources(uid_source, proc_source)?;
        let mut state = self.lock();
        state.process(time, &HashSet::new(), uid.as_ref(), proc.as_ref(), Bucket::Boottime)
    }

    /// Purges expired system-event data, then records a periodic poll.
    pub fn on_periodic_collection(
        &self,
        time: DateTime<Utc>,
        system_state: SystemState,
        uid_source: &Weak<dyn UidStatsSource>,
        proc_source: &Weak<dyn ProcStatSource>,
    ) -> Result<(), ProfilerError> {
        let (uid, proc) = resolve_sources(uid_source, proc_source)?;
        let mut state = self.lock();
        state.check_capacity(Bucket::Periodic)?;
        state.clear_expired_system_event_collections(time);
        debug!("Periodic collection in {:?}", system_state);
        state.process(time, &HashSet::new(), uid.as_ref(), proc.as_ref(), Bucket::Periodic)
    }

    /// Records a poll for the `from` → `to` user switch. Consecutive polls
    /// for the same switch share one collection.
    pub fn on_user_switch_collection(
        &self,
        time: DateTime<Utc>,
        from: u32,
        to: u32,
        uid_source: &Weak<dyn UidStatsSource>,
        proc_source: &Weak<dyn ProcStatSource>,
    ) -> Result<(), ProfilerError> {
        let (uid, proc) = resolve_sources(uid_source, proc_source)?;
        let mut state = self.lock();
        if state.max_user_switch_events == 0 {
            return Err(ProfilerError::InvalidConfig(
                "Maximum user-switch events cannot be 0".into(),
            ));
        }
        if !state
            .user_switch
            .back()
            .is_some_and(|u| u.is_switch(from, to))
        {
            state
                .user_switch
                .push_back(UserSwitchCollectionInfo::new(from, to));
            debug!("Started user-switch collection from {} to {}", from, to);
        }
        while state.user_switch.len() > state.max_user_switch_events {
            state.user_switch.pop_front();
        }
        state.process(
            time,
            &HashSet::new(),
            uid.as_ref(),
            proc.as_ref(),
            Bucket::LatestUserSwitch,
        )
    }

    pub fn on_wake_up_collection(
        &self,
        time: DateTime<Utc>,
        uid_source: &Weak<dyn UidStatsSource>,
        proc_source: &Weak<dyn ProcStatSource>,
    ) -> Result<(), ProfilerError> {
        let (uid, proc) = resolve_sources(uid_source, proc_source)?;
        let mut state = self.lock();
        state.process(time, &HashSet::new(), uid.as_ref(), proc.as_ref(), Bucket::WakeUp)
    }

    /// Records a custom poll. A non-empty `filter_packages` keeps only those
    /// packages, unranked and without a length cap.
    pub fn on_custom_collection(
        &self,
        time: DateTime<Utc>,
        system_state: SystemState,
        filter_packages: &HashSet<String>,
        uid_source: &Weak<dyn UidStatsSource>,
        proc_source: &Weak<dyn ProcStatSource>,
    ) -> Result<(), ProfilerError> {
        let (uid, proc) = resolve_sources(uid_source, proc_source)?;
        let mut state = self.lock();
        debug!(
            "Custom collection in {:?} with {} filtered packages",
            system_state,
            filter_packages.len()
        );
        state.process(time, filter_packages, uid.as_ref(), proc.as_ref(), Bucket::Custom)
    }

    /// Writes the custom collection report to `out`. Passing `None` ends the
    /// custom collection and discards its records instead.
    pub fn on_custom_collection_dump(
        &self,
        out: Option<&mut (dyn Write + '_)>,
    ) -> Result<(), ProfilerError> {
        let mut state = self.lock();
        match out {
            None => {
                // A terminated profiler stays unable to record custom polls.
                state.custom = if state.limits.is_some() {
                    CollectionInfo::unbounded()
                } else {
                    CollectionInfo::default()
                };
                info!("Custom collection ended, cleared its records");
                Ok(())
            }
            Some(out) => text::write_custom_report(out, &state.custom),
        }
    }

    /// Writes the boot-time, wake-up, user-switch and periodic reports.
    pub fn on_dump(&self, out: &mut dyn Write) -> Result<(), ProfilerError> {
        let state = self.lock();
        text::write_report(out, &state)
    }

    /// Builds the structured form of every collection.
    pub fn on_dump_structured(&self, intervals: &CollectionIntervals) -> PerformanceStats {
        let state = self.lock();
        build_performance_stats(&state, intervals)
    }

    /// Writes the structured dump as pretty JSON.
    pub fn on_dump_json(
        &self,
        intervals: &CollectionIntervals,
        out: &mut dyn Write,
    ) -> Result<(), ProfilerError> {
        let stats = self.on_dump_structured(intervals);
        let bytes = serde_json::to_vec_pretty(&stats)?;
        out.write_all(&bytes)
            .map_err(ProfilerError::dump("structured"))
    }

    pub fn boottime_collection(&self) -> CollectionInfo {
        self.lock().boottime.clone()
    }

    pub fn periodic_collection(&self) -> CollectionInfo {
        self.lock().periodic.clone()
    }

    pub fn wake_up_collection(&self) -> CollectionInfo {
        self.lock().wake_up.clone()
    }

    pub fn custom_collection(&self) -> CollectionInfo {
        self.lock().custom.clone()
    }

    pub fn user_switch_collections(&self) -> Vec<UserSwitchCollectionInfo> {
        self.lock().user_switch.iter().cloned().collect()
    }
}
