//! Per-(uid, package) stats views and top-N ranking.
//!
//! A [`UserPackageStats`] is one entry of a ranked category list. It holds
//! exactly one [`StatsView`] shape; the `Empty` shape marks an unused slot in
//! a pre-sized list and terminates the list once ranking is done.

use crate::stats::{MetricType, UidState, UidStats};

/// Process-level metrics that can be ranked with a single scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatType {
    IoBlockedTasksCount,
    MajorFaults,
}

/// Foreground/background storage I/O of a UID for one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStatsView {
    /// Bytes, indexed by [`UidState`].
    pub bytes: [u64; 2],
    /// Fsync calls, indexed by [`UidState`].
    pub fsync: [u64; 2],
}

impl IoStatsView {
    pub fn total_bytes(&self) -> u64 {
        self.bytes[0].saturating_add(self.bytes[1])
    }
}

/// A process and its value for a scalar metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessValue {
    pub comm: String,
    pub value: u64,
}

/// A UID-level scalar metric with its top processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcSingleStatsView {
    pub value: u64,
    pub top_n_processes: Vec<ProcessValue>,
}

/// A process and its CPU usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCpuValue {
    pub comm: String,
    pub cpu_time_millis: u64,
    pub cpu_cycles: u64,
}

/// UID-level CPU usage with its top processes by CPU time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcCpuStatsView {
    pub cpu_time_millis: u64,
    pub cpu_cycles: u64,
    pub top_n_processes: Vec<ProcessCpuValue>,
}

/// The shape of a [`UserPackageStats`] entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatsView {
    /// Placeholder for a slot nothing was ranked into.
    #[default]
    Empty,
    Io(IoStatsView),
    ProcSingle(ProcSingleStatsView),
    ProcCpu(ProcCpuStatsView),
}

/// One ranked entry: a UID, its package and one stats view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPackageStats {
    pub uid: u32,
    pub generic_package_name: String,
    pub stats_view: StatsView,
}

impl UserPackageStats {
    /// Builds an I/O view for `metric` (read or write bytes). The fsync
    /// counters are always attached.
    pub fn from_io(metric: MetricType, uid_stats: &UidStats) -> Self {
        let io = &uid_stats.io_stats;
        Self {
            uid: uid_stats.uid,
            generic_package_name: uid_stats.generic_package_name.clone(),
            stats_view: StatsView::Io(IoStatsView {
                bytes: [
                    io.get(metric, UidState::Foreground),
                    io.get(metric, UidState::Background),
                ],
                fsync: [
                    io.get(MetricType::FsyncCount, UidState::Foreground),
                    io.get(MetricType::FsyncCount, UidState::Background),
                ],
            }),
        }
    }

    /// Builds a scalar view for `stat_type` with the top `top_n_process_count`
    /// processes by the same metric.
    pub fn from_proc_single(
        stat_type: ProcStatType,
        uid_stats: &UidStats,
        top_n_process_count: usize,
    ) -> Self {
        let procs = &uid_stats.proc_stats;
        let value = match stat_type {
            ProcStatType::IoBlockedTasksCount => procs.io_blocked_tasks_count,
            ProcStatType::MajorFaults => procs.total_major_faults,
        };

        let candidates = procs.process_stats_by_pid.values().map(|p| ProcessValue {
            comm: p.comm.clone(),
            value: match stat_type {
                ProcStatType::IoBlockedTasksCount => p.io_blocked_tasks_count,
                ProcStatType::MajorFaults => p.total_major_faults,
            },
        });

        Self {
            uid: uid_stats.uid,
            generic_package_name: uid_stats.generic_package_name.clone(),
            stats_view: StatsView::ProcSingle(ProcSingleStatsView {
                value,
                top_n_processes: top_n_processes(candidates, top_n_process_count, |p| p.value),
            }),
        }
    }

    /// Builds a CPU view ranked by the UID's CPU time, with the top
    /// `top_n_process_count` processes by CPU time. Cycles ride along but are
    /// not used for ranking.
    pub fn from_cpu_time(uid_stats: &UidStats, top_n_process_count: usize) -> Self {
        let procs = &uid_stats.proc_stats;
        let candidates = procs
            .process_stats_by_pid
            .values()
            .map(|p| ProcessCpuValue {
                comm: p.comm.clone(),
                cpu_time_millis: p.cpu_time_millis,
                cpu_cycles: p.total_cpu_cycles,
            });

        Self {
            uid: uid_stats.uid,
            generic_package_name: uid_stats.generic_package_name.clone(),
            stats_view: StatsView::ProcCpu(ProcCpuStatsView {
                cpu_time_millis: uid_stats.cpu_time_millis,
                cpu_cycles: procs.cpu_cycles,
                top_n_processes: top_n_processes(candidates, top_n_process_count, |p| {
                    p.cpu_time_millis
                }),
            }),
        }
    }

    /// Value this entry is ranked by.
    pub fn value(&self) -> u64 {
        match &self.stats_view {
            StatsView::Empty => 0,
            StatsView::Io(view) => view.total_bytes(),
            StatsView::ProcSingle(view) => view.value,
            StatsView::ProcCpu(view) => view.cpu_time_millis,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.stats_view, StatsView::Empty)
    }
}

/// Inserts `candidate` before the first slot whose value is smaller and drops
/// the last slot, keeping the list length fixed.
///
/// Returns false without touching the list when no slot is smaller.
fn insert_ranked<T, V>(slots: &mut Vec<T>, candidate: T, value_fn: V) -> bool
where
    V: Fn(&T) -> u64,
{
    let value = value_fn(&candidate);
    match slots.iter().position(|slot| value > value_fn(slot)) {
        Some(index) => {
            slots.insert(index, candidate);
            slots.pop();
            true
        }
        None => false,
    }
}

/// Keeps the `count` highest non-zero candidates, descending.
fn top_n_processes<T, I, V>(candidates: I, count: usize, value_fn: V) -> Vec<T>
where
    T: Default,
    I: Iterator<Item = T>,
    V: Fn(&T) -> u64,
{
    let mut slots: Vec<T> = std::iter::repeat_with(T::default).take(count).collect();
    let mut cached = 0usize;
    for candidate in candidates {
        if value_fn(&candidate) == 0 {
            continue;
        }
        if insert_ranked(&mut slots, candidate, &value_fn) {
            cached += 1;
        }
    }
    slots.truncate(cached.min(count));
    slots
}

/// Ranks `candidate` into a fixed-length top-N category list.
///
/// Zero-valued candidates are never cached. Returns whether the candidate
/// made it into the list.
pub fn cache_top_n_stats(candidate: UserPackageStats, top_n_stats: &mut Vec<UserPackageStats>) -> bool {
    if candidate.value() == 0 {
        return false;
    }
    insert_ranked(top_n_stats, candidate, UserPackageStats::value)
}

/// Truncates a ranked list at its first empty slot.
pub fn remove_empty_stats(top_n_stats: &mut Vec<UserPackageStats>) {
    if let Some(index) = top_n_stats.iter().position(UserPackageStats::is_empty) {
        top_n_stats.truncate(index);
    }
}
