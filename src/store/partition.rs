// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Quarter partition keys and record key encoding
//!
//! A record belongs to exactly one partition at any time, determined solely
//! by its start-time field: the calendar quarter `{year}_Q{n}`. Partition
//! assignment is recomputed, and the record moved, whenever the start time
//! changes via update.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::record::instant_millis;

const TREE_PREFIX: &str = "records_";

/// A quarter-keyed logical shard, `YYYY_Qn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub year: i32,
    /// 1-4
    pub quarter: u8,
}

impl PartitionKey {
    /// Derive the partition for an instant. Depends only on the instant's
    /// calendar components, never on cycle configuration.
    pub fn from_instant(at: NaiveDateTime) -> Self {
        Self {
            year: at.year(),
            quarter: (at.month0() / 3) as u8 + 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (year, quarter) = s.split_once("_Q")?;
        let year = year.parse().ok()?;
        let quarter: u8 = quarter.parse().ok()?;
        if (1..=4).contains(&quarter) {
            Some(Self { year, quarter })
        } else {
            None
        }
    }

    /// Physical tree name backing this partition
    pub fn tree_name(&self) -> String {
        format!("{}{}", TREE_PREFIX, self)
    }

    pub fn from_tree_name(name: &str) -> Option<Self> {
        Self::parse(name.strip_prefix(TREE_PREFIX)?)
    }

    /// First instant of the quarter
    pub fn range_start(&self) -> NaiveDateTime {
        let month = (self.quarter as u32 - 1) * 3 + 1;
        NaiveDate::from_ymd_opt(self.year, month, 1)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    /// First instant of the next quarter (exclusive bound)
    pub fn range_end(&self) -> NaiveDateTime {
        self.next().range_start()
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }

    /// True when the quarter intersects the (optional) query window.
    /// The basis of partition pruning.
    pub fn overlaps(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> bool {
        let after_start = start.map_or(true, |s| self.range_end() > s);
        let before_end = end.map_or(true, |e| self.range_start() <= e);
        after_start && before_end
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_Q{}", self.year, self.quarter)
    }
}

/// Partition lifecycle: registered (key derived, no physical tree),
/// materialized (tree exists), locked (migration writing it)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Registered,
    Materialized,
    Locked,
}

/// Storage key for a record within its partition tree: a zero-padded
/// millisecond timestamp followed by the identity key. Bytewise order over
/// these keys is timestamp order, so key range scans are index scans.
pub fn record_key(at: NaiveDateTime, identity: &str) -> Vec<u8> {
    format!("{:020}_{}", instant_millis(at), identity).into_bytes()
}

/// Lower range bound for all records at or after `at`
pub fn range_lower_bound(at: NaiveDateTime) -> Vec<u8> {
    format!("{:020}", instant_millis(at)).into_bytes()
}

/// Upper (exclusive) range bound covering all records at or before `at`
pub fn range_upper_bound(at: NaiveDateTime) -> Vec<u8> {
    format!("{:020}", instant_millis(at) + 1).into_bytes()
}
