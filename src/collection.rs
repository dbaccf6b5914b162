//! Bounded caches of poll records, one per collection event.
//!
//! A [`CollectionInfo`] keeps records in chronological order and evicts the
//! oldest once it would grow past its capacity.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::summary::PerfStatsRecord;

/// Records of one collection event, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionInfo {
    max_cache_size: usize,
    records: VecDeque<PerfStatsRecord>,
}

impl CollectionInfo {
    /// Creates an empty collection holding at most `max_cache_size` records.
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            max_cache_size,
            records: VecDeque::new(),
        }
    }

    /// Creates an empty collection with no practical capacity limit.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Appends a record, evicting the oldest ones first so the length never
    /// exceeds the capacity. A zero-capacity collection drops the record.
    pub fn push(&mut self, record: PerfStatsRecord) {
        if self.max_cache_size == 0 {
            return;
        }
        while self.records.len() >= self.max_cache_size {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Returns all records in chronological order (oldest to newest).
    pub fn records(&self) -> &VecDeque<PerfStatsRecord> {
        &self.records
    }

    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Time of the most recent record.
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.records.back().map(|r| r.time)
    }

    /// Span between the oldest and the newest record.
    pub fn duration(&self) -> Duration {
        match (self.records.front(), self.records.back()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => Duration::zero(),
        }
    }

    /// True when the newest record is at least `max_age` older than `now`.
    /// An empty collection never expires.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.last_time().is_some_and(|last| now - last >= max_age)
    }
}

/// Records collected around one user switch.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSwitchCollectionInfo {
    pub from: u32,
    pub to: u32,
    pub collection: CollectionInfo,
}

impl UserSwitchCollectionInfo {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            collection: CollectionInfo::unbounded(),
        }
    }

    pub fn is_switch(&self, from: u32, to: u32) -> bool {
        self.from == from && self.to == to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{SystemSummaryStats, UserPackageSummaryStats};
    use chrono::TimeZone;

    fn record_at(secs: i64) -> PerfStatsRecord {
        PerfStatsRecord::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            SystemSummaryStats::default(),
            UserPackageSummaryStats::default(),
        )
    }

    #[test]
    fn test_collection_push_and_read() {
        let mut collection = CollectionInfo::new(3);

        assert_eq!(collection.len(), 0);
        assert_eq!(collection.max_cache_size(), 3);

        collection.push(record_at(1000));

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.records()[0].time.timestamp(), 1000);
    }

    #[test]
    fn test_collection_evicts_oldest() {
        let mut collection = CollectionInfo::new(3);

        // Push 5 records; only the last 3 survive.
        for i in 0..5 {
            collection.push(record_at(1000 + i * 100));
            assert!(collection.len() <= 3);
        }

        let times: Vec<i64> = collection.records().iter().map(|r| r.time.timestamp()).collect();
        assert_eq!(times, vec![1200, 1300, 1400]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut collection = CollectionInfo::default();
        collection.push(record_at(1));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_duration_and_expiry() {
        let mut collection = CollectionInfo::unbounded();
        assert_eq!(collection.duration(), Duration::zero());
        assert!(!collection.is_expired(Utc.timestamp_opt(10_000, 0).unwrap(), Duration::seconds(60)));

        collection.push(record_at(1000));
        collection.push(record_at(1030));
        assert_eq!(collection.duration(), Duration::seconds(30));

        let max_age = Duration::seconds(60);
        assert!(!collection.is_expired(Utc.timestamp_opt(1089, 0).unwrap(), max_age));
        assert!(collection.is_expired(Utc.timestamp_opt(1090, 0).unwrap(), max_age));
    }

    #[test]
    fn test_user_switch_matching() {
        let info = UserSwitchCollectionInfo::new(0, 10);
        assert!(info.is_switch(0, 10));
        assert!(!info.is_switch(10, 0));
        assert_eq!(info.collection.max_cache_size(), usize::MAX);
    }
}
