// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bucket: one cycle window's worth of records, plus its aggregate stats

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::analysis::TaskResultAnalyzer;
use crate::record::{FieldConfig, TaskRecord};

/// A cycle window with its member records, keyed by record identity
#[derive(Debug, Clone)]
pub struct Bucket {
    pub key: String,
    pub label: String,
    pub range_start: NaiveDateTime,
    pub range_end: NaiveDateTime,
    records: HashMap<String, TaskRecord>,
}

impl Bucket {
    pub fn new(
        key: String,
        label: String,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Self {
        Self {
            key,
            label,
            range_start,
            range_end,
            records: HashMap::new(),
        }
    }

    pub fn insert(&mut self, record_key: String, record: TaskRecord) {
        self.records.insert(record_key, record);
    }

    pub fn remove(&mut self, record_key: &str) -> Option<TaskRecord> {
        self.records.remove(record_key)
    }

    pub fn contains(&self, record_key: &str) -> bool {
        self.records.contains_key(record_key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &TaskRecord)> {
        self.records.iter()
    }

    pub fn record_keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Aggregate this bucket's records into display stats.
    ///
    /// The success rate uses the unique plan count as its denominator.
    pub fn stats(&self, analyzer: &TaskResultAnalyzer, fields: &FieldConfig) -> BucketStats {
        let mut plan_ids: HashSet<String> = HashSet::new();
        let mut results: Vec<&str> = Vec::with_capacity(self.records.len());

        for record in self.records.values() {
            if let Some(plan_id) = record.plan_id(fields) {
                plan_ids.insert(plan_id);
            }
            if let Some(result) = record.task_result(fields) {
                results.push(result);
            }
        }

        let plan_count = plan_ids.len();
        let failure_count = analyzer.failure_count(results.iter().copied());
        let success_rate = analyzer.success_rate(results.iter().copied(), plan_count);

        BucketStats {
            key: self.key.clone(),
            label: self.label.clone(),
            range_start: self.range_start,
            range_end: self.range_end,
            record_count: self.records.len(),
            plan_count,
            failure_count,
            success_rate,
        }
    }
}

/// Aggregated view of one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub key: String,
    pub label: String,
    pub range_start: NaiveDateTime,
    pub range_end: NaiveDateTime,
    pub record_count: usize,
    /// Unique plan ids; the success-rate denominator
    pub plan_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
}
