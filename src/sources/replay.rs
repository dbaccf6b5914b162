//! Playback of recorded polls.
//!
//! A [`ReplaySource`] implements both source traits over the same list of
//! polls. Each trait keeps its own cursor and wraps around at the end, so
//! the profiler sees matching UID and system deltas as long as it asks both
//! once per poll.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::stats::{ProcStatInfo, ProcStatSource, UidStats, UidStatsSource};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Replay file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read replay file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse replay JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Deltas of a single poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedPoll {
    #[serde(default)]
    pub uid_stats: Vec<UidStats>,
    #[serde(default)]
    pub proc_stat: ProcStatInfo,
}

/// Root structure of a replay file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFile {
    pub version: String,
    pub generated_at: String,
    pub polls: Vec<RecordedPoll>,
}

/// Load a replay file from JSON.
pub fn load_replay_file(path: &Path) -> Result<ReplayFile, SourceError> {
    debug!("Loading replay file from: {}", path.display());

    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let replay: ReplayFile = serde_json::from_str(&content)?;

    info!(
        "Loaded replay file version {} from {} ({} polls)",
        replay.version,
        replay.generated_at,
        replay.polls.len()
    );

    Ok(replay)
}

/// Serves recorded polls in order, wrapping around at the end.
///
/// An empty replay yields no UIDs and zeroed system counters.
#[derive(Debug, Default)]
pub struct ReplaySource {
    polls: Vec<RecordedPoll>,
    uid_cursor: AtomicUsize,
    proc_cursor: AtomicUsize,
}

impl ReplaySource {
    pub fn new(polls: Vec<RecordedPoll>) -> Self {
        Self {
            polls,
            uid_cursor: AtomicUsize::new(0),
            proc_cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        Ok(Self::new(load_replay_file(path)?.polls))
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    fn next_poll(&self, cursor: &AtomicUsize) -> Option<&RecordedPoll> {
        if self.polls.is_empty() {
            return None;
        }
        let index = cursor.fetch_add(1, Ordering::Relaxed) % self.polls.len();
        self.polls.get(index)
    }
}

impl From<ReplayFile> for ReplaySource {
    fn from(file: ReplayFile) -> Self {
        Self::new(file.polls)
    }
}

impl UidStatsSource for ReplaySource {
    fn delta_stats(&self) -> Vec<UidStats> {
        self.next_poll(&self.uid_cursor)
            .map(|poll| poll.uid_stats.clone())
            .unwrap_or_default()
    }
}

impl ProcStatSource for ReplaySource {
    fn delta_stats(&self) -> ProcStatInfo {
        self.next_poll(&self.proc_cursor)
            .map(|poll| poll.proc_stat)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn poll(total_cpu: u64, uid: u32) -> RecordedPoll {
        RecordedPoll {
            uid_stats: vec![UidStats {
                uid,
                generic_package_name: format!("pkg{}", uid),
                ..Default::default()
            }],
            proc_stat: ProcStatInfo {
                total_cpu_time_millis: total_cpu,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_cursors_advance_independently_and_wrap() {
        let source = ReplaySource::new(vec![poll(10, 1), poll(20, 2)]);

        let first = UidStatsSource::delta_stats(&source);
        let second = UidStatsSource::delta_stats(&source);
        let third = UidStatsSource::delta_stats(&source);
        assert_eq!(first[0].uid, 1);
        assert_eq!(second[0].uid, 2);
        assert_eq!(third[0].uid, 1);

        // The system cursor has not moved yet.
        assert_eq!(ProcStatSource::delta_stats(&source).total_cpu_time_millis, 10);
        assert_eq!(ProcStatSource::delta_stats(&source).total_cpu_time_millis, 20);
    }

    #[test]
    fn test_empty_replay_yields_defaults() {
        let source = ReplaySource::default();
        assert!(UidStatsSource::delta_stats(&source).is_empty());
        assert_eq!(ProcStatSource::delta_stats(&source), ProcStatInfo::default());
    }

    #[test]
    fn test_load_replay_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("replay.json");
        let file = ReplayFile {
            version: "1.0".into(),
            generated_at: "2024-01-01T00:00:00Z".into(),
            polls: vec![poll(5, 1_010_001)],
        };
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let loaded = load_replay_file(&path).expect("valid replay");
        assert_eq!(loaded, file);

        let source = ReplaySource::from_file(&path).expect("valid replay");
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_load_missing_replay_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = load_replay_file(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }
}
