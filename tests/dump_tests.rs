//! Integration tests for the text and structured reports.

use chrono::{TimeZone, Utc};
use std::io::{self, Write};
use std::sync::Arc;

use perf_profiler::sources::RecordedPoll;
use perf_profiler::stats::{ProcessStats, UidIoStats, UidProcStats};
use perf_profiler::{
    CollectionIntervals, PerformanceProfiler, PerformanceStats, ProcStatInfo, ProcStatSource,
    ProfilerConfig, ProfilerError, ReplaySource, UidStats, UidStatsSource,
};

fn sample_poll() -> RecordedPoll {
    let mut proc_stats = UidProcStats {
        cpu_time_millis: 500,
        cpu_cycles: 5_000,
        total_major_faults: 40,
        total_tasks_count: 8,
        io_blocked_tasks_count: 2,
        ..Default::default()
    };
    proc_stats.process_stats_by_pid.insert(
        2001,
        ProcessStats {
            comm: "MapsApp".into(),
            cpu_time_millis: 300,
            total_cpu_cycles: 3_000,
            io_blocked_tasks_count: 2,
            total_major_faults: 30,
        },
    );
    proc_stats.process_stats_by_pid.insert(
        2002,
        ProcessStats {
            comm: "MapsRender".into(),
            cpu_time_millis: 200,
            total_cpu_cycles: 2_000,
            io_blocked_tasks_count: 0,
            total_major_faults: 10,
        },
    );
    RecordedPoll {
        uid_stats: vec![UidStats {
            uid: 1_010_001,
            generic_package_name: "com.example.maps".into(),
            cpu_time_millis: 500,
            io_stats: UidIoStats::new(1_000, 0, 2_000, 500, 4, 1),
            proc_stats,
        }],
        proc_stat: ProcStatInfo {
            cpu_io_wait_time_millis: 100,
            cpu_idle_time_millis: 400,
            total_cpu_time_millis: 1_000,
            context_switches_count: 300,
            io_blocked_process_count: 1,
            total_process_count: 10,
        },
    }
}

fn profiler_with_boottime_record() -> (PerformanceProfiler, Arc<dyn UidStatsSource>, Arc<dyn ProcStatSource>) {
    let profiler = PerformanceProfiler::new(ProfilerConfig::default());
    profiler.init().unwrap();
    let source = Arc::new(ReplaySource::new(vec![sample_poll()]));
    let uid: Arc<dyn UidStatsSource> = source.clone();
    let proc: Arc<dyn ProcStatSource> = source;
    profiler
        .on_boottime_collection(
            Utc.with_ymd_and_hms(2024, 3, 9, 8, 15, 30).unwrap(),
            &Arc::downgrade(&uid),
            &Arc::downgrade(&proc),
        )
        .unwrap();
    (profiler, uid, proc)
}

fn dump_text(profiler: &PerformanceProfiler) -> String {
    let mut out = Vec::new();
    profiler.on_dump(&mut out).expect("dump succeeds");
    String::from_utf8(out).expect("utf-8 report")
}

#[test]
fn test_text_dump_sections_in_order() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();
    let report = dump_text(&profiler);

    let sections = [
        "Boot-time performance report:",
        "Wake-up performance report:",
        "User-switch events performance report:",
        "Last N minutes performance report:",
    ];
    let positions: Vec<usize> = sections
        .iter()
        .map(|s| report.find(s).unwrap_or_else(|| panic!("missing section {}", s)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Wake-up, user-switch and periodic collections are empty.
    assert_eq!(report.matches("No collection recorded").count(), 3);
}

#[test]
fn test_text_dump_record_tables() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();
    let report = dump_text(&profiler);

    assert!(report.contains("Collection duration: 0 seconds\nNumber of collections: 1\n"));
    assert!(report.contains("Total CPU time (ms): 1000\n"));
    assert!(report.contains("Total CPU cycles: 5000\n"));
    assert!(report.contains("Number of I/O blocked processes/percent: 1 / 10.00%\n"));

    assert!(report.contains("\nTop N CPU Times:\n----------------\n"));
    assert!(report.contains("10, com.example.maps, 500, 50.00%, 5000\n"));
    assert!(report.contains("\tMapsApp, 300, 60.00%, 3000\n"));

    assert!(report.contains("\nTop N Storage I/O Reads:\n"));
    assert!(report.contains("10, com.example.maps, 1000, 100.00%, 4, 100.00%, 0, 0.00%, 1, 100.00%\n"));

    assert!(report.contains("\nTop N I/O waiting UIDs:\n"));
    assert!(report.contains("10, com.example.maps, 2, 25.00%\n\tMapsApp, 2, 100.00%\n"));

    assert!(report.contains("\nTop N major page faults:\n"));
    assert!(report.contains("\tMapsRender, 10, 25.00%\n"));
    assert!(report.contains("Number of major page faults since last collection: 40\n"));
    assert!(report.contains("Percentage of change in major page faults since last collection: 0.00%\n"));
}

#[test]
fn test_custom_dump_title() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();
    let mut out = Vec::new();
    profiler
        .on_custom_collection_dump(Some(&mut out))
        .expect("dump succeeds");
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("Custom performance data report:"));
    assert!(report.ends_with("No collection recorded\n"));
}

struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_dump_write_failure_keeps_state() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();

    match profiler.on_dump(&mut FailingWriter) {
        Err(ProfilerError::Dump { section, .. }) => assert_eq!(section, "boot-time"),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(profiler.boottime_collection().len(), 1);
}

#[test]
fn test_structured_dump() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();
    let intervals = CollectionIntervals::default();
    let stats = profiler.on_dump_structured(&intervals);

    assert_eq!(stats.boot_time_stats.collection_interval_millis, 1_000);
    assert_eq!(stats.last_n_minutes_stats.collection_interval_millis, 20_000);
    assert!(stats.user_switch_stats.is_empty());

    let record = &stats.boot_time_stats.records[0];
    assert_eq!((record.date.year, record.date.month, record.date.day), (2024, 3, 9));
    assert_eq!(
        (record.time.hours, record.time.minutes, record.time.seconds),
        (8, 15, 30)
    );
    assert_eq!(record.system_wide_stats.total_major_page_faults, 40);
    assert_eq!(record.system_wide_stats.total_process_count, 10);
    assert_eq!(record.system_wide_stats.major_faults_percent_change, None);
    assert_eq!(record.system_wide_stats.total_storage_io_stats.fg_bytes, 2_000);
    assert_eq!(record.system_wide_stats.total_storage_io_stats.bg_bytes, 500);
    assert_eq!(record.system_wide_stats.total_storage_io_read_stats.fg_bytes, 1_000);

    assert_eq!(record.package_cpu_stats.len(), 1);
    assert_eq!(record.package_cpu_stats[0].user_package_info.user_id, 10);
    assert_eq!(record.package_cpu_stats[0].process_cpu_stats.len(), 2);
    assert_eq!(record.package_task_state_stats[0].total_task_count, 8);
    assert_eq!(record.package_major_page_faults[0].major_page_faults_count, 40);

    // The JSON form round-trips through serde.
    let mut json = Vec::new();
    profiler.on_dump_json(&intervals, &mut json).unwrap();
    let parsed: PerformanceStats = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed, stats);
}

#[test]
fn test_structured_dump_carries_fault_trend() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();

    let mut poll = sample_poll();
    poll.uid_stats[0].proc_stats.total_major_faults = 60;
    let source = Arc::new(ReplaySource::new(vec![poll]));
    let uid: Arc<dyn UidStatsSource> = source.clone();
    let proc: Arc<dyn ProcStatSource> = source;
    profiler
        .on_wake_up_collection(
            Utc.with_ymd_and_hms(2024, 3, 9, 8, 20, 0).unwrap(),
            &Arc::downgrade(&uid),
            &Arc::downgrade(&proc),
        )
        .unwrap();

    let stats = profiler.on_dump_structured(&CollectionIntervals::default());
    let wake_up = &stats.wake_up_stats.records[0].system_wide_stats;
    assert_eq!(wake_up.total_major_page_faults, 60);
    assert_eq!(wake_up.major_faults_percent_change, Some(50.0));
    assert_eq!(wake_up.total_process_count, 10);

    let mut json = Vec::new();
    profiler
        .on_dump_json(&CollectionIntervals::default(), &mut json)
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    let system = &value["wake_up_stats"]["records"][0]["system_wide_stats"];
    assert_eq!(system["major_faults_percent_change"], 50.0);
    assert_eq!(system["total_process_count"], 10);
}

#[test]
fn test_json_dump_write_failure() {
    let (profiler, _uid, _proc) = profiler_with_boottime_record();

    match profiler.on_dump_json(&CollectionIntervals::default(), &mut FailingWriter) {
        Err(ProfilerError::Dump { section, .. }) => assert_eq!(section, "structured"),
        other => panic!("unexpected result {:?}", other),
    }
}
