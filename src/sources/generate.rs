//! Synthetic replay generation.
//!
//! Produces random but plausible deltas for a fixed set of packages, for
//! exercising the profiler without a real device.

use chrono::Utc;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use super::replay::{RecordedPoll, ReplayFile};
use crate::stats::{ProcStatInfo, ProcessStats, UidIoStats, UidProcStats, UidStats};

// Upper bounds for one poll's deltas
const MAX_PROCESSES_PER_UID: usize = 4;
const MAX_PROCESS_CPU_MILLIS: u64 = 2_000;
const CYCLES_PER_MILLI: u64 = 1_000_000;
const MAX_IO_BYTES: u64 = 64 * 1024 * 1024;
const MAX_FSYNC: u64 = 200;
const MAX_MAJOR_FAULTS: u64 = 5_000;
const MAX_BLOCKED_TASKS: u64 = 3;

const FIRST_APP_UID: u32 = 10_000;
const FIRST_PID: u32 = 1_000;

fn generate_uid_stats<R: Rng>(rng: &mut R, uid: u32, package: &str, next_pid: &mut u32) -> UidStats {
    let process_count = rng.gen_range(1..=MAX_PROCESSES_PER_UID);
    let mut process_stats_by_pid = BTreeMap::new();
    let mut total_tasks_count = 0;

    for i in 0..process_count {
        let cpu_time_millis = rng.gen_range(0..=MAX_PROCESS_CPU_MILLIS);
        let comm = if i == 0 {
            package.rsplit('.').next().unwrap_or(package).to_string()
        } else {
            format!("worker-{}", i)
        };
        process_stats_by_pid.insert(
            *next_pid,
            ProcessStats {
                comm,
                cpu_time_millis,
                total_cpu_cycles: cpu_time_millis * CYCLES_PER_MILLI,
                io_blocked_tasks_count: rng.gen_range(0..=MAX_BLOCKED_TASKS),
                total_major_faults: rng.gen_range(0..=MAX_MAJOR_FAULTS),
            },
        );
        total_tasks_count += rng.gen_range(1..=8u64);
        *next_pid += 1;
    }

    let processes = process_stats_by_pid.values();
    let proc_stats = UidProcStats {
        cpu_time_millis: processes.clone().map(|p| p.cpu_time_millis).sum(),
        cpu_cycles: processes.clone().map(|p| p.total_cpu_cycles).sum(),
        total_major_faults: processes.clone().map(|p| p.total_major_faults).sum(),
        total_tasks_count,
        io_blocked_tasks_count: processes.map(|p| p.io_blocked_tasks_count).sum(),
        process_stats_by_pid,
    };

    // Background packages rarely do foreground I/O and the other way round.
    let foreground = rng.gen_bool(0.5);
    let mut io = |active: bool| {
        if active {
            rng.gen_range(0..=MAX_IO_BYTES)
        } else {
            rng.gen_range(0..=MAX_IO_BYTES / 64)
        }
    };
    let (fg_rd, bg_rd, fg_wr, bg_wr) = (io(foreground), io(!foreground), io(foreground), io(!foreground));

    UidStats {
        uid,
        generic_package_name: package.to_string(),
        cpu_time_millis: proc_stats.cpu_time_millis,
        io_stats: UidIoStats::new(
            fg_rd,
            bg_rd,
            fg_wr,
            bg_wr,
            rng.gen_range(0..=MAX_FSYNC),
            rng.gen_range(0..=MAX_FSYNC),
        ),
        proc_stats,
    }
}

fn generate_proc_stat<R: Rng>(rng: &mut R, uid_stats: &[UidStats]) -> ProcStatInfo {
    let busy: u64 = uid_stats.iter().map(|u| u.cpu_time_millis).sum();
    let cpu_idle_time_millis = rng.gen_range(0..=busy.max(1) * 2);
    let cpu_io_wait_time_millis = rng.gen_range(0..=busy.max(1) / 10);
    let total_process_count = uid_stats
        .iter()
        .map(|u| u.proc_stats.process_stats_by_pid.len() as u32)
        .sum::<u32>();
    ProcStatInfo {
        cpu_io_wait_time_millis,
        cpu_idle_time_millis,
        total_cpu_time_millis: busy + cpu_idle_time_millis + cpu_io_wait_time_millis,
        context_switches_count: rng.gen_range(1_000..=500_000),
        io_blocked_process_count: rng.gen_range(0..=total_process_count),
        total_process_count,
    }
}

/// Generates `polls` random polls covering `packages`, using `rng`.
///
/// Each package gets its own app UID for user 0 or user 10.
pub fn generate_replay_with<R: Rng>(rng: &mut R, polls: usize, packages: &[String]) -> ReplayFile {
    let uids: Vec<u32> = packages
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let user = if rng.gen_bool(0.5) { 0 } else { 10 };
            user * crate::stats::AID_USER_OFFSET + FIRST_APP_UID + i as u32
        })
        .collect();

    let mut next_pid = FIRST_PID;
    let recorded = (0..polls)
        .map(|_| {
            let uid_stats: Vec<UidStats> = packages
                .iter()
                .zip(&uids)
                .map(|(package, &uid)| generate_uid_stats(rng, uid, package, &mut next_pid))
                .collect();
            let proc_stat = generate_proc_stat(rng, &uid_stats);
            RecordedPoll {
                uid_stats,
                proc_stat,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "Generated {} polls for {} packages",
        recorded.len(),
        packages.len()
    );

    ReplayFile {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        polls: recorded,
    }
}

/// Generates `polls` random polls covering `packages`.
pub fn generate_replay(polls: usize, packages: &[String]) -> ReplayFile {
    generate_replay_with(&mut rand::thread_rng(), polls, packages)
}
