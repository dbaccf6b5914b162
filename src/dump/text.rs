//! Human-readable performance report.

use std::io::Write;

use crate::collection::{CollectionInfo, UserSwitchCollectionInfo};
use crate::error::ProfilerError;
use crate::package_stats::{StatsView, UserPackageStats};
use crate::profiler::ProfilerState;
use crate::stats::{user_id, MetricType, UidState, METRIC_TYPES, UID_STATES};
use crate::summary::{PerfStatsRecord, SystemSummaryStats, UserPackageSummaryStats};

pub const EMPTY_COLLECTION_MESSAGE: &str = "No collection recorded\n";

const CPU_TIME_HEADER: &str = "Android User ID, Package Name, CPU Time (ms), Percentage of total \
CPU time, CPU Cycles\n\tCommand, CPU Time (ms), Percentage of UID's CPU Time, CPU Cycles\n";
const IO_STATS_HEADER: &str = "Android User ID, Package Name, Foreground Bytes, Foreground Bytes %, \
Foreground Fsync, Foreground Fsync %, Background Bytes, Background Bytes %, Background Fsync, \
Background Fsync %\n";
const IO_BLOCKED_HEADER: &str = "Android User ID, Package Name, Number of owned tasks waiting for \
I/O, Percentage of owned tasks waiting for I/O\n\tCommand, Number of I/O waiting tasks, \
Percentage of UID's tasks waiting for I/O\n";
const MAJOR_FAULTS_HEADER: &str = "Android User ID, Package Name, Number of major page faults, \
Percentage of total major page faults\n\tCommand, Number of major page faults, Percentage of \
UID's major page faults\n";

/// `numer` as a percentage of `denom`, or 0 when `denom` is 0.
pub fn percentage(numer: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        numer as f64 / denom as f64 * 100.0
    }
}

fn section_title(title: &str, underline: &str) -> String {
    format!("{}\n{}:\n{}\n", "-".repeat(75), title, underline)
}

fn table_title(title: &str, underline_len: usize) -> String {
    format!("\n{}:\n{}\n", title, "-".repeat(underline_len))
}

fn io_stats_line(
    stats: &UserPackageStats,
    metric: MetricType,
    totals: &[[u64; UID_STATES]; METRIC_TYPES],
) -> String {
    let StatsView::Io(view) = &stats.stats_view else {
        return String::new();
    };
    let mut line = format!("{}, {}", user_id(stats.uid), stats.generic_package_name);
    for state in [UidState::Foreground, UidState::Background] {
        let i = state as usize;
        line.push_str(&format!(
            ", {}, {:.2}%, {}, {:.2}%",
            view.bytes[i],
            percentage(view.bytes[i], totals[metric as usize][i]),
            view.fsync[i],
            percentage(view.fsync[i], totals[MetricType::FsyncCount as usize][i]),
        ));
    }
    line.push('\n');
    line
}

/// Renders a CPU or scalar entry and its process breakdown against
/// `total_value`.
fn proc_stats_lines(stats: &UserPackageStats, total_value: u64) -> String {
    let uid = user_id(stats.uid);
    let package = &stats.generic_package_name;
    match &stats.stats_view {
        StatsView::ProcCpu(view) => {
            let mut buffer = format!(
                "{}, {}, {}, {:.2}%, {}\n",
                uid,
                package,
                view.cpu_time_millis,
                percentage(view.cpu_time_millis, total_value),
                view.cpu_cycles
            );
            for process in &view.top_n_processes {
                buffer.push_str(&format!(
                    "\t{}, {}, {:.2}%, {}\n",
                    process.comm,
                    process.cpu_time_millis,
                    percentage(process.cpu_time_millis, view.cpu_time_millis),
                    process.cpu_cycles
                ));
            }
            buffer
        }
        StatsView::ProcSingle(view) => {
            let mut buffer = format!(
                "{}, {}, {}, {:.2}%\n",
                uid,
                package,
                view.value,
                percentage(view.value, total_value)
            );
            for process in &view.top_n_processes {
                buffer.push_str(&format!(
                    "\t{}, {}, {:.2}%\n",
                    process.comm,
                    process.value,
                    percentage(process.value, view.value)
                ));
            }
            buffer
        }
        StatsView::Io(_) | StatsView::Empty => String::new(),
    }
}

pub fn user_package_summary_to_string(summary: &UserPackageSummaryStats) -> String {
    let mut buffer = String::new();
    if !summary.top_n_cpu_times.is_empty() {
        buffer.push_str(&table_title("Top N CPU Times", 16));
        buffer.push_str(CPU_TIME_HEADER);
        for stats in &summary.top_n_cpu_times {
            buffer.push_str(&proc_stats_lines(stats, summary.total_cpu_time_millis));
        }
    }
    if !summary.top_n_io_reads.is_empty() {
        buffer.push_str(&table_title("Top N Storage I/O Reads", 24));
        buffer.push_str(IO_STATS_HEADER);
        for stats in &summary.top_n_io_reads {
            buffer.push_str(&io_stats_line(stats, MetricType::ReadBytes, &summary.total_io_stats));
        }
    }
    if !summary.top_n_io_writes.is_empty() {
        buffer.push_str(&table_title("Top N Storage I/O Writes", 25));
        buffer.push_str(IO_STATS_HEADER);
        for stats in &summary.top_n_io_writes {
            buffer.push_str(&io_stats_line(stats, MetricType::WriteBytes, &summary.total_io_stats));
        }
    }
    if !summary.top_n_io_blocked.is_empty() {
        buffer.push_str(&table_title("Top N I/O waiting UIDs", 23));
        buffer.push_str(IO_BLOCKED_HEADER);
        for stats in &summary.top_n_io_blocked {
            if let Some(task_count) = summary.task_count_by_uid.get(&stats.uid) {
                buffer.push_str(&proc_stats_lines(stats, *task_count));
            }
        }
    }
    if !summary.top_n_major_faults.is_empty() {
        buffer.push_str(&table_title("Top N major page faults", 24));
        buffer.push_str(MAJOR_FAULTS_HEADER);
        for stats in &summary.top_n_major_faults {
            buffer.push_str(&proc_stats_lines(stats, summary.total_major_faults));
        }
        buffer.push_str(&format!(
            "Number of major page faults since last collection: {}\n\
             Percentage of change in major page faults since last collection: {:.2}%\n",
            summary.total_major_faults,
            summary.major_faults_percent_change.unwrap_or(0.0)
        ));
    }
    buffer
}

pub fn system_summary_to_string(stats: &SystemSummaryStats) -> String {
    format!(
        "Total CPU time (ms): {}\n\
         Total CPU cycles: {}\n\
         Total idle CPU time (ms)/percent: {} / {:.2}%\n\
         CPU I/O wait time (ms)/percent: {} / {:.2}%\n\
         Number of context switches: {}\n\
         Number of I/O blocked processes/percent: {} / {:.2}%\n",
        stats.total_cpu_time_millis,
        stats.total_cpu_cycles,
        stats.cpu_idle_time_millis,
        percentage(stats.cpu_idle_time_millis, stats.total_cpu_time_millis),
        stats.cpu_io_wait_time_millis,
        percentage(stats.cpu_io_wait_time_millis, stats.total_cpu_time_millis),
        stats.context_switches_count,
        stats.io_blocked_process_count,
        percentage(
            u64::from(stats.io_blocked_process_count),
            u64::from(stats.total_process_count)
        ),
    )
}

pub fn record_to_string(record: &PerfStatsRecord) -> String {
    let mut buffer = system_summary_to_string(&record.system_summary_stats);
    buffer.push_str(&user_package_summary_to_string(
        &record.user_package_summary_stats,
    ));
    buffer
}

pub fn collection_to_string(collection: &CollectionInfo) -> String {
    if collection.is_empty() {
        return EMPTY_COLLECTION_MESSAGE.to_string();
    }
    let mut buffer = format!(
        "Collection duration: {} seconds\nNumber of collections: {}\n",
        collection.duration().num_seconds(),
        collection.len()
    );
    for (i, record) in collection.records().iter().enumerate() {
        buffer.push_str(&format!(
            "\nCollection {}: <{}>\n{}\n{}",
            i,
            record.time.format("%c %Z"),
            "=".repeat(45),
            record_to_string(record)
        ));
    }
    buffer
}

fn write_section(
    out: &mut dyn Write,
    section: &'static str,
    title: String,
    body: String,
) -> Result<(), ProfilerError> {
    out.write_all(title.as_bytes())
        .and_then(|_| out.write_all(body.as_bytes()))
        .map_err(ProfilerError::dump(section))
}

fn write_user_switch_section(
    out: &mut dyn Write,
    collections: &[&UserSwitchCollectionInfo],
) -> Result<(), ProfilerError> {
    const SECTION: &str = "user-switch";
    let mut header = section_title("User-switch events performance report", &"=".repeat(38));
    if collections.is_empty() {
        header.push_str(EMPTY_COLLECTION_MESSAGE);
    } else {
        header.push_str(&format!(
            "Number of user switch events: {}\n",
            collections.len()
        ));
    }
    out.write_all(header.as_bytes())
        .map_err(ProfilerError::dump(SECTION))?;

    for (i, info) in collections.iter().enumerate() {
        let title = format!(
            "\nEvent {}: From: {} To: {}\n{}\n",
            i,
            info.from,
            info.to,
            "=".repeat(26)
        );
        write_section(out, SECTION, title, collection_to_string(&info.collection))?;
    }
    Ok(())
}

/// Writes the boot-time, wake-up, user-switch and periodic sections.
pub(crate) fn write_report(out: &mut dyn Write, state: &ProfilerState) -> Result<(), ProfilerError> {
    write_section(
        out,
        "boot-time",
        section_title("Boot-time performance report", &"=".repeat(33)),
        collection_to_string(&state.boottime),
    )?;
    write_section(
        out,
        "wake-up",
        section_title("Wake-up performance report", &"=".repeat(27)),
        collection_to_string(&state.wake_up),
    )?;
    let user_switches: Vec<&UserSwitchCollectionInfo> = state.user_switch.iter().collect();
    write_user_switch_section(out, &user_switches)?;
    write_section(
        out,
        "periodic",
        section_title("Last N minutes performance report", &"=".repeat(38)),
        collection_to_string(&state.periodic),
    )
}

pub(crate) fn write_custom_report(
    out: &mut dyn Write,
    custom: &CollectionInfo,
) -> Result<(), ProfilerError> {
    write_section(
        out,
        "custom",
        section_title("Custom performance data report", &"-".repeat(75)),
        collection_to_string(custom),
    )
}
