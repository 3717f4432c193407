// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! DataStore: bidirectional record/bucket index with incremental maintenance

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use std::collections::{HashMap, HashSet};

use super::bucket::{Bucket, BucketStats};
use crate::analysis::TaskResultAnalyzer;
use crate::cycle::{CycleGroup, CycleRuleEngine, CycleType};
use crate::record::{FieldConfig, TaskRecord};

/// Outcome of a batch load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Records skipped for unparseable/missing time fields or duplicate keys
    pub skipped: usize,
}

/// Time-bucketed secondary index over an in-memory record set.
///
/// Maintains `record_key -> bucket_key` and `bucket_key -> {record_key}`
/// together on every mutation; the two directions never diverge. Changing
/// the cycle type or configuration requires a full [`DataStore::load_data`]
/// rebuild — buckets are not incrementally re-keyed.
#[derive(Debug, Default)]
pub struct DataStore {
    fields: FieldConfig,
    buckets: HashMap<String, Bucket>,
    record_to_bucket: HashMap<String, String>,
    bucket_members: HashMap<String, HashSet<String>>,
    /// Per-calendar-day group resolution cache, rebuilt on each load.
    /// Only consulted when the active cycle's windows are day-aligned, so a
    /// day straddling two windows can never be mis-resolved.
    day_groups: HashMap<NaiveDate, CycleGroup>,
}

impl DataStore {
    pub fn new(fields: FieldConfig) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn fields(&self) -> &FieldConfig {
        &self.fields
    }

    pub fn bucket(&self, key: &str) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn record_count(&self) -> usize {
        self.record_to_bucket.len()
    }

    pub fn bucket_of(&self, record_key: &str) -> Option<&str> {
        self.record_to_bucket.get(record_key).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.record_to_bucket.clear();
        self.bucket_members.clear();
        self.day_groups.clear();
    }

    /// Single-pass batch load, replacing all current state.
    ///
    /// Duplicate identity keys are skipped (first record wins), records with
    /// unparseable or missing time fields are skipped with a warning rather
    /// than failing the batch.
    pub fn load_data(
        &mut self,
        records: Vec<TaskRecord>,
        engine: &CycleRuleEngine,
        cycle: CycleType,
    ) -> LoadReport {
        self.clear();
        let cacheable = engine.day_aligned(cycle);
        let mut report = LoadReport::default();

        for record in records {
            let key = match record.identity_key(&self.fields) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping record without identity: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };
            if self.record_to_bucket.contains_key(&key) {
                report.skipped += 1;
                continue;
            }
            let at = match record.start_time(&self.fields) {
                Ok(at) => at,
                Err(e) => {
                    warn!("Skipping record {}: {}", key, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let group = self.resolve_group(at, engine, cycle, cacheable);
            self.insert_into_bucket(key, record, group);
            report.loaded += 1;
        }

        report
    }

    /// Single-record incremental insert.
    ///
    /// If the identity key is already indexed (possibly in a different
    /// bucket), the record replaces the old copy. Returns the affected bucket
    /// key, or `None` when the record's time cannot be parsed.
    pub fn upsert_record(
        &mut self,
        record: TaskRecord,
        engine: &CycleRuleEngine,
        cycle: CycleType,
    ) -> Option<String> {
        let key = match record.identity_key(&self.fields) {
            Ok(key) => key,
            Err(e) => {
                warn!("Cannot index record without identity: {}", e);
                return None;
            }
        };
        let at = match record.start_time(&self.fields) {
            Ok(at) => at,
            Err(e) => {
                warn!("Cannot index record {}: {}", key, e);
                return None;
            }
        };

        self.remove_record(&key);
        let group = engine.group_for(at, cycle);
        let bucket_key = group.key.clone();
        self.insert_into_bucket(key, record, group);
        Some(bucket_key)
    }

    /// Incremental update or delete.
    ///
    /// Removes the record from its previously-indexed bucket (if any), then
    /// unless `is_delete` re-inserts it (the target bucket may differ if the
    /// record's time changed). Returns the set of buckets touched (0, 1 or 2)
    /// so callers can re-render incrementally.
    pub fn update_record(
        &mut self,
        record: &TaskRecord,
        engine: &CycleRuleEngine,
        cycle: CycleType,
        is_delete: bool,
    ) -> Vec<String> {
        let mut touched = Vec::new();

        let key = match record.identity_key(&self.fields) {
            Ok(key) => key,
            Err(e) => {
                warn!("Cannot update record without identity: {}", e);
                return touched;
            }
        };
        if let Some(old_bucket) = self.remove_record(&key) {
            touched.push(old_bucket);
        }

        if !is_delete {
            if let Some(new_bucket) = self.upsert_record(record.clone(), engine, cycle) {
                if !touched.contains(&new_bucket) {
                    touched.push(new_bucket);
                }
            }
        }

        touched
    }

    /// Remove a record by identity key. Returns the bucket it occupied.
    pub fn remove_record(&mut self, record_key: &str) -> Option<String> {
        let bucket_key = self.record_to_bucket.remove(record_key)?;
        if let Some(members) = self.bucket_members.get_mut(&bucket_key) {
            members.remove(record_key);
        }
        if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
            bucket.remove(record_key);
            if bucket.is_empty() {
                self.buckets.remove(&bucket_key);
                self.bucket_members.remove(&bucket_key);
            }
        }
        Some(bucket_key)
    }

    /// Per-bucket aggregate stats, ascending by range start.
    ///
    /// A bucket is included iff its full range lies inside the requested
    /// window: `range_start >= start` and `range_end <= end`. Overlap is not
    /// enough.
    pub fn stats(
        &self,
        analyzer: &TaskResultAnalyzer,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Vec<BucketStats> {
        let mut stats: Vec<BucketStats> = self
            .buckets
            .values()
            .filter(|bucket| {
                start.map_or(true, |s| bucket.range_start >= s)
                    && end.map_or(true, |e| bucket.range_end <= e)
            })
            .map(|bucket| bucket.stats(analyzer, &self.fields))
            .collect();
        stats.sort_by_key(|s| s.range_start);
        stats
    }

    fn resolve_group(
        &mut self,
        at: NaiveDateTime,
        engine: &CycleRuleEngine,
        cycle: CycleType,
        cacheable: bool,
    ) -> CycleGroup {
        if cacheable {
            if let Some(group) = self.day_groups.get(&at.date()) {
                return group.clone();
            }
            let group = engine.group_for(at, cycle);
            self.day_groups.insert(at.date(), group.clone());
            group
        } else {
            engine.group_for(at, cycle)
        }
    }

    fn insert_into_bucket(&mut self, record_key: String, record: TaskRecord, group: CycleGroup) {
        let bucket = self.buckets.entry(group.key.clone()).or_insert_with(|| {
            Bucket::new(
                group.key.clone(),
                group.label.clone(),
                group.range_start,
                group.range_end,
            )
        });
        bucket.insert(record_key.clone(), record);
        self.bucket_members
            .entry(group.key.clone())
            .or_default()
            .insert(record_key.clone());
        self.record_to_bucket.insert(record_key, group.key);
    }

    /// Check that the forward and reverse maps agree. Test support.
    #[doc(hidden)]
    pub fn verify_index_consistency(&self) -> bool {
        if self.record_to_bucket.len()
            != self.buckets.values().map(Bucket::len).sum::<usize>()
        {
            return false;
        }
        for (record_key, bucket_key) in &self.record_to_bucket {
            let in_bucket = self
                .buckets
                .get(bucket_key)
                .map_or(false, |b| b.contains(record_key));
            let in_members = self
                .bucket_members
                .get(bucket_key)
                .map_or(false, |m| m.contains(record_key));
            if !in_bucket || !in_members {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, start: &str, result: &str) -> TaskRecord {
        match json!({
            "id": id,
            "plan_id": format!("PLAN-{}", id),
            "start_time": start,
            "task_result": result,
        }) {
            serde_json::Value::Object(map) => TaskRecord::new(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_load_dedups_by_identity() {
        let mut store = DataStore::new(FieldConfig::default());
        let engine = CycleRuleEngine::with_defaults();
        let report = store.load_data(
            vec![
                record(1, "2024-01-15 10:00:00", "正常"),
                record(1, "2024-01-15 11:00:00", "正常"),
            ],
            &engine,
            CycleType::Day,
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn test_unparseable_time_is_skipped_not_fatal() {
        let mut store = DataStore::new(FieldConfig::default());
        let engine = CycleRuleEngine::with_defaults();
        let report = store.load_data(
            vec![
                record(1, "2024-01-15 10:00:00", "正常"),
                record(2, "whenever", "正常"),
            ],
            &engine,
            CycleType::Day,
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_update_moves_record_between_buckets() {
        let mut store = DataStore::new(FieldConfig::default());
        let engine = CycleRuleEngine::with_defaults();
        store.load_data(
            vec![record(1, "2024-01-15 10:00:00", "正常")],
            &engine,
            CycleType::Day,
        );

        let moved = record(1, "2024-01-20 10:00:00", "正常");
        let touched = store.update_record(&moved, &engine, CycleType::Day, false);
        assert_eq!(touched, vec!["2024-01-15".to_string(), "2024-01-20".to_string()]);
        assert_eq!(store.bucket_of("1"), Some("2024-01-20"));
        assert!(store.bucket("2024-01-15").is_none());
        assert!(store.verify_index_consistency());
    }

    #[test]
    fn test_delete_removes_from_index() {
        let mut store = DataStore::new(FieldConfig::default());
        let engine = CycleRuleEngine::with_defaults();
        let r = record(1, "2024-01-15 10:00:00", "正常");
        store.load_data(vec![r.clone()], &engine, CycleType::Day);

        let touched = store.update_record(&r, &engine, CycleType::Day, true);
        assert_eq!(touched, vec!["2024-01-15".to_string()]);
        assert_eq!(store.record_count(), 0);
        assert!(store.verify_index_consistency());
    }

    #[test]
    fn test_stats_window_requires_full_containment() {
        let mut store = DataStore::new(FieldConfig::default());
        let engine = CycleRuleEngine::with_defaults();
        let analyzer = TaskResultAnalyzer::new();
        store.load_data(
            vec![
                record(1, "2024-01-15 10:00:00", "正常"),
                record(2, "2024-01-16 10:00:00", "因设备故障失败"),
            ],
            &engine,
            CycleType::Day,
        );

        // Window starts mid-bucket: the 15th's bucket is excluded
        let start = NaiveDateTime::parse_from_str("2024-01-15 12:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let stats = store.stats(&analyzer, Some(start), None);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].key, "2024-01-16");
        assert_eq!(stats[0].failure_count, 1);
    }
}
