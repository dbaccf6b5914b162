//! Input data model for one collection poll.
//!
//! This module defines the per-UID and system-wide delta structures handed
//! to the profiler by its stat sources, along with the source traits
//! themselves. The profiler never parses `/proc` itself; whoever owns the
//! sources is responsible for producing deltas since the previous poll.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of UIDs reserved per Android-style user.
pub const AID_USER_OFFSET: u32 = 100_000;

/// Returns the user id that owns `uid`.
pub fn user_id(uid: u32) -> u32 {
    uid / AID_USER_OFFSET
}

/// Storage I/O metric kinds tracked per UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    ReadBytes = 0,
    WriteBytes = 1,
    FsyncCount = 2,
}

/// Number of [`MetricType`] variants.
pub const METRIC_TYPES: usize = 3;

/// Whether the UID was in the foreground or background when the I/O happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UidState {
    Foreground = 0,
    Background = 1,
}

/// Number of [`UidState`] variants.
pub const UID_STATES: usize = 2;

/// Storage I/O counters for a UID, indexed by metric type and UID state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidIoStats {
    pub metrics: [[u64; UID_STATES]; METRIC_TYPES],
}

impl UidIoStats {
    /// Builds the matrix from the six individual counters.
    pub fn new(
        fg_read_bytes: u64,
        bg_read_bytes: u64,
        fg_write_bytes: u64,
        bg_write_bytes: u64,
        fg_fsync: u64,
        bg_fsync: u64,
    ) -> Self {
        Self {
            metrics: [
                [fg_read_bytes, bg_read_bytes],
                [fg_write_bytes, bg_write_bytes],
                [fg_fsync, bg_fsync],
            ],
        }
    }

    pub fn get(&self, metric: MetricType, state: UidState) -> u64 {
        self.metrics[metric as usize][state as usize]
    }
}

/// Task stats for a single process owned by a UID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    /// Command name from `/proc/<pid>/comm`.
    pub comm: String,
    #[serde(default)]
    pub cpu_time_millis: u64,
    #[serde(default)]
    pub total_cpu_cycles: u64,
    #[serde(default)]
    pub io_blocked_tasks_count: u64,
    #[serde(default)]
    pub total_major_faults: u64,
}

/// Aggregated process stats for a UID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidProcStats {
    #[serde(default)]
    pub cpu_time_millis: u64,
    #[serde(default)]
    pub cpu_cycles: u64,
    #[serde(default)]
    pub total_major_faults: u64,
    #[serde(default)]
    pub total_tasks_count: u64,
    #[serde(default)]
    pub io_blocked_tasks_count: u64,
    /// Keyed by pid. Ordered so rankings with equal values are stable.
    #[serde(default)]
    pub process_stats_by_pid: BTreeMap<u32, ProcessStats>,
}

/// Resource usage delta for one UID since the previous poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidStats {
    pub uid: u32,
    /// Shared package name for UIDs hosting several packages, otherwise the
    /// package name itself.
    pub generic_package_name: String,
    /// UID-level CPU time from per-UID CPU accounting.
    #[serde(default)]
    pub cpu_time_millis: u64,
    #[serde(default)]
    pub io_stats: UidIoStats,
    #[serde(default)]
    pub proc_stats: UidProcStats,
}

impl UidStats {
    pub fn user_id(&self) -> u32 {
        user_id(self.uid)
    }
}

/// System-wide CPU and process counters since the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcStatInfo {
    #[serde(default)]
    pub cpu_io_wait_time_millis: u64,
    #[serde(default)]
    pub cpu_idle_time_millis: u64,
    #[serde(default)]
    pub total_cpu_time_millis: u64,
    #[serde(default)]
    pub context_switches_count: u64,
    #[serde(default)]
    pub io_blocked_process_count: u32,
    #[serde(default)]
    pub total_process_count: u32,
}

/// Source of per-UID deltas.
///
/// Each call advances the source's baseline, so a returned list is only
/// meaningful for the poll that requested it.
pub trait UidStatsSource: Send + Sync {
    fn delta_stats(&self) -> Vec<UidStats>;
}

/// Source of system-wide deltas. Same advancing semantics as
/// [`UidStatsSource`].
pub trait ProcStatSource: Send + Sync {
    fn delta_stats(&self) -> ProcStatInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_uid() {
        assert_eq!(user_id(1009), 0);
        assert_eq!(user_id(1_002_001), 10);
        assert_eq!(user_id(1_012_345), 10);
    }

    #[test]
    fn test_io_stats_indexing() {
        let io = UidIoStats::new(1, 2, 3, 4, 5, 6);
        assert_eq!(io.get(MetricType::ReadBytes, UidState::Foreground), 1);
        assert_eq!(io.get(MetricType::ReadBytes, UidState::Background), 2);
        assert_eq!(io.get(MetricType::WriteBytes, UidState::Background), 4);
        assert_eq!(io.get(MetricType::FsyncCount, UidState::Foreground), 5);
    }

    #[test]
    fn test_uid_stats_deserialize_with_defaults() {
        let json = r#"{
            "uid": 1012345,
            "generic_package_name": "com.example.maps",
            "proc_stats": {
                "process_stats_by_pid": {
                    "200": { "comm": "MapsApp", "cpu_time_millis": 10 }
                }
            }
        }"#;
        let stats: UidStats = serde_json::from_str(json).expect("valid uid stats");
        assert_eq!(stats.user_id(), 10);
        assert_eq!(stats.cpu_time_millis, 0);
        assert_eq!(stats.proc_stats.process_stats_by_pid[&200].comm, "MapsApp");
        assert_eq!(stats.proc_stats.process_stats_by_pid[&200].total_major_faults, 0);
    }
}
