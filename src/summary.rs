//! Per-poll aggregation of UID and system-wide stats.
//!
//! This module turns the raw deltas of one poll into a [`PerfStatsRecord`]:
//! five ranked category lists plus running totals for the UIDs, and a copy
//! of the system-wide counters.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::{DateTime, Utc};

use crate::package_stats::{
    cache_top_n_stats, remove_empty_stats, ProcStatType, UserPackageStats,
};
use crate::stats::{MetricType, ProcStatInfo, UidIoStats, UidStats, METRIC_TYPES, UID_STATES};

/// Breadth settings for one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopNLimits {
    /// Entries kept per category list.
    pub per_category: usize,
    /// Processes kept inside each ranked entry.
    pub per_subcategory: usize,
}

/// Ranked UID stats and totals for one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPackageSummaryStats {
    pub top_n_cpu_times: Vec<UserPackageStats>,
    pub top_n_io_reads: Vec<UserPackageStats>,
    pub top_n_io_writes: Vec<UserPackageStats>,
    pub top_n_io_blocked: Vec<UserPackageStats>,
    pub top_n_major_faults: Vec<UserPackageStats>,
    pub total_io_stats: [[u64; UID_STATES]; METRIC_TYPES],
    /// Total task count for UIDs present in `top_n_io_blocked`.
    pub task_count_by_uid: HashMap<u32, u64>,
    pub total_cpu_time_millis: u64,
    pub total_cpu_cycles: u64,
    pub total_major_faults: u64,
    /// Unset on the first poll and whenever the previous total was zero.
    pub major_faults_percent_change: Option<f64>,
}

/// System-wide counters for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemSummaryStats {
    pub cpu_io_wait_time_millis: u64,
    pub cpu_idle_time_millis: u64,
    pub total_cpu_time_millis: u64,
    pub total_cpu_cycles: u64,
    pub context_switches_count: u64,
    pub io_blocked_process_count: u32,
    pub total_process_count: u32,
}

impl From<&ProcStatInfo> for SystemSummaryStats {
    fn from(info: &ProcStatInfo) -> Self {
        Self {
            cpu_io_wait_time_millis: info.cpu_io_wait_time_millis,
            cpu_idle_time_millis: info.cpu_idle_time_millis,
            total_cpu_time_millis: info.total_cpu_time_millis,
            total_cpu_cycles: 0,
            context_switches_count: info.context_switches_count,
            io_blocked_process_count: info.io_blocked_process_count,
            total_process_count: info.total_process_count,
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfStatsRecord {
    pub time: DateTime<Utc>,
    pub system_summary_stats: SystemSummaryStats,
    pub user_package_summary_stats: UserPackageSummaryStats,
}

impl PerfStatsRecord {
    /// Pairs both summaries, sharing the system CPU time with the UID view
    /// and the aggregated UID cycles with the system view.
    pub fn new(
        time: DateTime<Utc>,
        mut system_summary_stats: SystemSummaryStats,
        mut user_package_summary_stats: UserPackageSummaryStats,
    ) -> Self {
        user_package_summary_stats.total_cpu_time_millis =
            system_summary_stats.total_cpu_time_millis;
        system_summary_stats.total_cpu_cycles = user_package_summary_stats.total_cpu_cycles;
        Self {
            time,
            system_summary_stats,
            user_package_summary_stats,
        }
    }
}

/// Adds `entry` into `total` cell by cell, saturating at `u64::MAX`.
pub fn add_uid_io_stats(entry: &UidIoStats, total: &mut [[u64; UID_STATES]; METRIC_TYPES]) {
    for (total_row, entry_row) in total.iter_mut().zip(entry.metrics.iter()) {
        for (total_cell, entry_cell) in total_row.iter_mut().zip(entry_row.iter()) {
            *total_cell = total_cell.saturating_add(*entry_cell);
        }
    }
}

/// Builds the UID summary for one poll.
///
/// With an empty `filter_packages` set every category is ranked into
/// `limits.per_category` slots. Otherwise only UIDs whose package is in the
/// set are kept, appended unranked to every category.
///
/// `last_major_faults` carries the previous poll's total across calls and
/// is updated here. An empty `uid_stats` leaves everything untouched.
pub fn build_user_package_summary(
    uid_stats: &[UidStats],
    filter_packages: &HashSet<String>,
    limits: TopNLimits,
    last_major_faults: &mut u64,
) -> UserPackageSummaryStats {
    let mut summary = UserPackageSummaryStats::default();
    if uid_stats.is_empty() {
        return summary;
    }

    let ranked = filter_packages.is_empty();
    if ranked {
        let slots = vec![UserPackageStats::default(); limits.per_category];
        summary.top_n_cpu_times = slots.clone();
        summary.top_n_io_reads = slots.clone();
        summary.top_n_io_writes = slots.clone();
        summary.top_n_io_blocked = slots.clone();
        summary.top_n_major_faults = slots;
    }

    for cur in uid_stats {
        summary.total_cpu_cycles = summary
            .total_cpu_cycles
            .saturating_add(cur.proc_stats.cpu_cycles);
        add_uid_io_stats(&cur.io_stats, &mut summary.total_io_stats);
        summary.total_major_faults = summary
            .total_major_faults
            .saturating_add(cur.proc_stats.total_major_faults);

        let io_reads = UserPackageStats::from_io(MetricType::ReadBytes, cur);
        let io_writes = UserPackageStats::from_io(MetricType::WriteBytes, cur);
        let cpu_time = UserPackageStats::from_cpu_time(cur, limits.per_subcategory);
        let io_blocked = UserPackageStats::from_proc_single(
            ProcStatType::IoBlockedTasksCount,
            cur,
            limits.per_subcategory,
        );
        let major_faults = UserPackageStats::from_proc_single(
            ProcStatType::MajorFaults,
            cur,
            limits.per_subcategory,
        );

        if ranked {
            cache_top_n_stats(io_reads, &mut summary.top_n_io_reads);
            cache_top_n_stats(io_writes, &mut summary.top_n_io_writes);
            cache_top_n_stats(cpu_time, &mut summary.top_n_cpu_times);
            if cache_top_n_stats(io_blocked, &mut summary.top_n_io_blocked) {
                summary
                    .task_count_by_uid
                    .insert(cur.uid, cur.proc_stats.total_tasks_count);
            }
            cache_top_n_stats(major_faults, &mut summary.top_n_major_faults);
        } else if filter_packages.contains(&cur.generic_package_name) {
            summary.top_n_io_reads.push(io_reads);
            summary.top_n_io_writes.push(io_writes);
            summary.top_n_cpu_times.push(cpu_time);
            summary.top_n_io_blocked.push(io_blocked);
            summary.top_n_major_faults.push(major_faults);
            summary
                .task_count_by_uid
                .insert(cur.uid, cur.proc_stats.total_tasks_count);
        }
    }

    if *last_major_faults != 0 {
        let previous = *last_major_faults as f64;
        let increase = summary.total_major_faults as f64 - previous;
        summary.major_faults_percent_change = Some(increase / previous * 100.0);
    }
    *last_major_faults = summary.total_major_faults;

    remove_empty_stats(&mut summary.top_n_cpu_times);
    remove_empty_stats(&mut summary.top_n_io_reads);
    remove_empty_stats(&mut summary.top_n_io_writes);
    remove_empty_stats(&mut summary.top_n_io_blocked);
    remove_empty_stats(&mut summary.top_n_major_faults);

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ProcessStats, UidProcStats};

    fn uid_entry(uid: u32, package: &str, cpu: u64, read: u64, faults: u64) -> UidStats {
        let mut proc_stats = UidProcStats {
            cpu_time_millis: cpu,
            cpu_cycles: cpu * 100,
            total_major_faults: faults,
            total_tasks_count: 4,
            io_blocked_tasks_count: faults / 10,
            ..Default::default()
        };
        proc_stats.process_stats_by_pid.insert(
            uid,
            ProcessStats {
                comm: format!("{}-main", package),
                cpu_time_millis: cpu,
                total_cpu_cycles: cpu * 100,
                io_blocked_tasks_count: faults / 10,
                total_major_faults: faults,
            },
        );
        UidStats {
            uid,
            generic_package_name: package.to_string(),
            cpu_time_millis: cpu,
            io_stats: UidIoStats::new(read, 0, read / 2, 0, 1, 0),
            proc_stats,
        }
    }

    fn limits(per_category: usize) -> TopNLimits {
        TopNLimits {
            per_category,
            per_subcategory: 5,
        }
    }

    #[test]
    fn test_ranked_lists_are_sorted_and_pruned() {
        let input = vec![
            uid_entry(1001, "a", 10, 100, 0),
            uid_entry(1002, "b", 30, 0, 50),
            uid_entry(1003, "c", 20, 300, 20),
        ];
        let mut last = 0;
        let summary = build_user_package_summary(&input, &HashSet::new(), limits(10), &mut last);

        let cpu: Vec<u32> = summary.top_n_cpu_times.iter().map(|s| s.uid).collect();
        assert_eq!(cpu, vec![1002, 1003, 1001]);

        // uid 1002 has no reads, so it never makes the cut.
        let reads: Vec<u32> = summary.top_n_io_reads.iter().map(|s| s.uid).collect();
        assert_eq!(reads, vec![1003, 1001]);

        let faults: Vec<u32> = summary.top_n_major_faults.iter().map(|s| s.uid).collect();
        assert_eq!(faults, vec![1002, 1003]);

        for list in [
            &summary.top_n_cpu_times,
            &summary.top_n_io_reads,
            &summary.top_n_io_writes,
            &summary.top_n_io_blocked,
            &summary.top_n_major_faults,
        ] {
            assert!(list.iter().all(|s| !s.is_empty() && s.value() > 0));
            assert!(list.windows(2).all(|w| w[0].value() >= w[1].value()));
        }

        assert_eq!(summary.task_count_by_uid.len(), 2);
        assert_eq!(summary.task_count_by_uid.get(&1002), Some(&4));
        assert!(!summary.task_count_by_uid.contains_key(&1001));
    }

    #[test]
    fn test_category_capacity_limits_entries() {
        let input = vec![
            uid_entry(1001, "a", 10, 0, 0),
            uid_entry(1002, "b", 30, 0, 0),
            uid_entry(1003, "c", 20, 0, 0),
        ];
        let mut last = 0;
        let summary = build_user_package_summary(&input, &HashSet::new(), limits(2), &mut last);
        let cpu: Vec<u64> = summary.top_n_cpu_times.iter().map(|s| s.value()).collect();
        assert_eq!(cpu, vec![30, 20]);
    }

    #[test]
    fn test_totals_accumulate() {
        let input = vec![uid_entry(1001, "a", 10, 100, 7), uid_entry(1002, "b", 20, 300, 3)];
        let mut last = 0;
        let summary = build_user_package_summary(&input, &HashSet::new(), limits(10), &mut last);

        assert_eq!(summary.total_cpu_cycles, 3000);
        assert_eq!(summary.total_major_faults, 10);
        assert_eq!(summary.total_io_stats[MetricType::ReadBytes as usize], [400, 0]);
        assert_eq!(summary.total_io_stats[MetricType::WriteBytes as usize], [200, 0]);
        assert_eq!(summary.total_io_stats[MetricType::FsyncCount as usize], [2, 0]);
    }

    #[test]
    fn test_io_totals_saturate() {
        let mut total = [[0u64; UID_STATES]; METRIC_TYPES];
        let big = UidIoStats::new(u64::MAX - 5, 1, u64::MAX, 0, 0, u64::MAX);
        add_uid_io_stats(&big, &mut total);
        add_uid_io_stats(&UidIoStats::new(10, 1, 1, 0, 0, 1), &mut total);

        assert_eq!(total[0], [u64::MAX, 2]);
        assert_eq!(total[1], [u64::MAX, 0]);
        assert_eq!(total[2], [0, u64::MAX]);
    }

    #[test]
    fn test_filter_appends_every_matching_entry() {
        let input = vec![
            uid_entry(1001, "keep", 0, 0, 0),
            uid_entry(1002, "drop", 90, 90, 90),
            uid_entry(1003, "also-keep", 5, 0, 0),
        ];
        let filter: HashSet<String> = ["keep", "also-keep"].iter().map(|s| s.to_string()).collect();
        let mut last = 0;
        let summary = build_user_package_summary(&input, &filter, limits(1), &mut last);

        for list in [
            &summary.top_n_cpu_times,
            &summary.top_n_io_reads,
            &summary.top_n_io_writes,
            &summary.top_n_io_blocked,
            &summary.top_n_major_faults,
        ] {
            let uids: Vec<u32> = list.iter().map(|s| s.uid).collect();
            assert_eq!(uids, vec![1001, 1003]);
        }
        assert_eq!(summary.task_count_by_uid.len(), 2);
        // Totals still cover every UID.
        assert_eq!(summary.total_major_faults, 90);
    }

    #[test]
    fn test_major_faults_percent_change() {
        let mut last = 0;
        let first = build_user_package_summary(
            &[uid_entry(1001, "a", 1, 1, 200)],
            &HashSet::new(),
            limits(10),
            &mut last,
        );
        assert_eq!(first.major_faults_percent_change, None);
        assert_eq!(last, 200);

        let second = build_user_package_summary(
            &[uid_entry(1001, "a", 1, 1, 300)],
            &HashSet::new(),
            limits(10),
            &mut last,
        );
        assert_eq!(second.major_faults_percent_change, Some(50.0));

        let mut zero_prev = 0;
        let third = build_user_package_summary(
            &[uid_entry(1001, "a", 1, 1, 0)],
            &HashSet::new(),
            limits(10),
            &mut zero_prev,
        );
        assert_eq!(third.major_faults_percent_change, None);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut last = 42;
        let summary = build_user_package_summary(&[], &HashSet::new(), limits(10), &mut last);
        assert_eq!(summary, UserPackageSummaryStats::default());
        assert_eq!(last, 42);
    }

    #[test]
    fn test_record_shares_cpu_totals() {
        let info = ProcStatInfo {
            total_cpu_time_millis: 48_376,
            ..Default::default()
        };
        let user = UserPackageSummaryStats {
            total_cpu_cycles: 64_000,
            ..Default::default()
        };
        let record = PerfStatsRecord::new(Utc::now(), SystemSummaryStats::from(&info), user);
        assert_eq!(record.user_package_summary_stats.total_cpu_time_millis, 48_376);
        assert_eq!(record.system_summary_stats.total_cpu_cycles, 64_000);
    }
}
