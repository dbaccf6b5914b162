//! Structured form of the profiler's collections.
//!
//! Every collection becomes a [`StatsCollection`] carrying the interval it
//! was polled at and one [`StatsRecord`] per poll. Entries whose stats view
//! does not fit their category are skipped.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::collection::CollectionInfo;
use crate::config::CollectionIntervals;
use crate::package_stats::{StatsView, UserPackageStats};
use crate::profiler::ProfilerState;
use crate::stats::{user_id, MetricType, UidState, METRIC_TYPES, UID_STATES};
use crate::summary::{PerfStatsRecord, UserPackageSummaryStats};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub boot_time_stats: StatsCollection,
    pub wake_up_stats: StatsCollection,
    pub user_switch_stats: Vec<StatsCollection>,
    pub last_n_minutes_stats: StatsCollection,
    pub custom_collection_stats: StatsCollection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsCollection {
    pub collection_interval_millis: u64,
    pub records: Vec<StatsRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub id: usize,
    pub date: Date,
    pub time: TimeOfDay,
    pub system_wide_stats: SystemWideStats,
    pub package_cpu_stats: Vec<PackageCpuStats>,
    pub package_storage_io_read_stats: Vec<PackageStorageIoStats>,
    pub package_storage_io_write_stats: Vec<PackageStorageIoStats>,
    pub package_task_state_stats: Vec<PackageTaskStateStats>,
    pub package_major_page_faults: Vec<PackageMajorPageFaults>,
}

/// Calendar date in UTC. `month` is 1-12.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageIoStats {
    pub fg_bytes: u64,
    pub fg_fsync: u64,
    pub bg_bytes: u64,
    pub bg_fsync: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemWideStats {
    pub io_wait_time_millis: u64,
    pub idle_cpu_time_millis: u64,
    pub total_cpu_time_millis: u64,
    pub total_cpu_cycles: u64,
    pub total_context_switches: u64,
    pub total_io_blocked_processes: u32,
    pub total_process_count: u32,
    pub total_major_page_faults: u64,
    /// Unset when there is no earlier non-zero total to compare against.
    pub major_faults_percent_change: Option<f64>,
    /// Write bytes and fsync calls of all UIDs.
    pub total_storage_io_stats: StorageIoStats,
    /// Read bytes and fsync calls of all UIDs.
    pub total_storage_io_read_stats: StorageIoStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPackageInfo {
    pub user_id: u32,
    pub package_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    pub cpu_time_millis: u64,
    pub cpu_cycles: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCpuStats {
    pub command: String,
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCpuStats {
    pub user_package_info: UserPackageInfo,
    pub cpu_stats: CpuStats,
    pub process_cpu_stats: Vec<ProcessCpuStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStorageIoStats {
    pub user_package_info: UserPackageInfo,
    pub storage_io_stats: StorageIoStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTaskStateStats {
    pub command: String,
    pub io_blocked_task_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTaskStateStats {
    pub user_package_info: UserPackageInfo,
    pub io_blocked_task_count: u64,
    pub total_task_count: u64,
    pub process_task_state_stats: Vec<ProcessTaskStateStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMajorPageFaults {
    pub user_package_info: UserPackageInfo,
    pub major_page_faults_count: u64,
}

fn user_package_info(stats: &UserPackageStats) -> UserPackageInfo {
    UserPackageInfo {
        user_id: user_id(stats.uid),
        package_name: stats.generic_package_name.clone(),
    }
}

fn total_storage_io(
    totals: &[[u64; UID_STATES]; METRIC_TYPES],
    metric: MetricType,
) -> StorageIoStats {
    let fg = UidState::Foreground as usize;
    let bg = UidState::Background as usize;
    let fsync = MetricType::FsyncCount as usize;
    StorageIoStats {
        fg_bytes: totals[metric as usize][fg],
        fg_fsync: totals[fsync][fg],
        bg_bytes: totals[metric as usize][bg],
        bg_fsync: totals[fsync][bg],
    }
}

fn package_cpu_stats(list: &[UserPackageStats]) -> Vec<PackageCpuStats> {
    list.iter()
        .filter_map(|stats| match &stats.stats_view {
            StatsView::ProcCpu(view) => Some(PackageCpuStats {
                user_package_info: user_package_info(stats),
                cpu_stats: CpuStats {
                    cpu_time_millis: view.cpu_time_millis,
                    cpu_cycles: view.cpu_cycles,
                },
                process_cpu_stats: view
                    .top_n_processes
                    .iter()
                    .map(|p| ProcessCpuStats {
                        command: p.comm.clone(),
                        cpu_stats: CpuStats {
                            cpu_time_millis: p.cpu_time_millis,
                            cpu_cycles: p.cpu_cycles,
                        },
                    })
                    .collect(),
            }),
            _ => None,
        })
        .collect()
}

fn package_storage_io_stats(list: &[UserPackageStats]) -> Vec<PackageStorageIoStats> {
    let fg = UidState::Foreground as usize;
    let bg = UidState::Background as usize;
    list.iter()
        .filter_map(|stats| match &stats.stats_view {
            StatsView::Io(view) => Some(PackageStorageIoStats {
                user_package_info: user_package_info(stats),
                storage_io_stats: StorageIoStats {
                    fg_bytes: view.bytes[fg],
                    fg_fsync: view.fsync[fg],
                    bg_bytes: view.bytes[bg],
                    bg_fsync: view.fsync[bg],
                },
            }),
            _ => None,
        })
        .collect()
}

fn package_task_state_stats(summary: &UserPackageSummaryStats) -> Vec<PackageTaskStateStats> {
    summary
        .top_n_io_blocked
        .iter()
        .filter_map(|stats| {
            let total_task_count = *summary.task_count_by_uid.get(&stats.uid)?;
            let StatsView::ProcSingle(view) = &stats.stats_view else {
                return None;
            };
            Some(PackageTaskStateStats {
                user_package_info: user_package_info(stats),
                io_blocked_task_count: view.value,
                total_task_count,
                process_task_state_stats: view
                    .top_n_processes
                    .iter()
                    .map(|p| ProcessTaskStateStats {
                        command: p.comm.clone(),
                        io_blocked_task_count: p.value,
                    })
                    .collect(),
            })
        })
        .collect()
}

fn package_major_page_faults(list: &[UserPackageStats]) -> Vec<PackageMajorPageFaults> {
    list.iter()
        .filter_map(|stats| match &stats.stats_view {
            StatsView::ProcSingle(view) => Some(PackageMajorPageFaults {
                user_package_info: user_package_info(stats),
                major_page_faults_count: view.value,
            }),
            _ => None,
        })
        .collect()
}

pub fn stats_record(id: usize, record: &PerfStatsRecord) -> StatsRecord {
    let system = &record.system_summary_stats;
    let user = &record.user_package_summary_stats;
    StatsRecord {
        id,
        date: Date {
            year: record.time.year(),
            month: record.time.month(),
            day: record.time.day(),
        },
        time: TimeOfDay {
            hours: record.time.hour(),
            minutes: record.time.minute(),
            seconds: record.time.second(),
        },
        system_wide_stats: SystemWideStats {
            io_wait_time_millis: system.cpu_io_wait_time_millis,
            idle_cpu_time_millis: system.cpu_idle_time_millis,
            total_cpu_time_millis: system.total_cpu_time_millis,
            total_cpu_cycles: system.total_cpu_cycles,
            total_context_switches: system.context_switches_count,
            total_io_blocked_processes: system.io_blocked_process_count,
            total_process_count: system.total_process_count,
            total_major_page_faults: user.total_major_faults,
            major_faults_percent_change: user.major_faults_percent_change,
            total_storage_io_stats: total_storage_io(&user.total_io_stats, MetricType::WriteBytes),
            total_storage_io_read_stats: total_storage_io(
                &user.total_io_stats,
                MetricType::ReadBytes,
            ),
        },
        package_cpu_stats: package_cpu_stats(&user.top_n_cpu_times),
        package_storage_io_read_stats: package_storage_io_stats(&user.top_n_io_reads),
        package_storage_io_write_stats: package_storage_io_stats(&user.top_n_io_writes),
        package_task_state_stats: package_task_state_stats(user),
        package_major_page_faults: package_major_page_faults(&user.top_n_major_faults),
    }
}

pub fn stats_collection(collection: &CollectionInfo, interval_millis: u64) -> StatsCollection {
    StatsCollection {
        collection_interval_millis: interval_millis,
        records: collection
            .records()
            .iter()
            .enumerate()
            .map(|(id, record)| stats_record(id, record))
            .collect(),
    }
}

pub(crate) fn build_performance_stats(
    state: &ProfilerState,
    intervals: &CollectionIntervals,
) -> PerformanceStats {
    PerformanceStats {
        boot_time_stats: stats_collection(&state.boottime, intervals.boottime_interval_millis),
        wake_up_stats: stats_collection(&state.wake_up, intervals.wake_up_interval_millis),
        user_switch_stats: state
            .user_switch
            .iter()
            .map(|u| stats_collection(&u.collection, intervals.user_switch_interval_millis))
            .collect(),
        last_n_minutes_stats: stats_collection(&state.periodic, intervals.periodic_interval_millis),
        custom_collection_stats: stats_collection(&state.custom, intervals.custom_interval_millis),
    }
}
