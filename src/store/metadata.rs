// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persisted store metadata singleton
//!
//! Rewritten after every full store, append or batch update; read on cold
//! start so opening the store never requires a full partition scan.

use serde::{Deserialize, Serialize};

use super::backend::StorageTree;
use super::types::StoreResult;

pub const META_TREE: &str = "metadata";
pub const LOCATOR_TREE: &str = "record_index";
const META_KEY: &[u8] = b"store_meta";

/// One applied schema migration, kept for audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedMigration {
    pub from_version: u32,
    pub to_version: u32,
    pub applied_at_ms: i64,
    /// Partitions materialized by this step
    pub partitions: Vec<String>,
}

/// Singleton metadata record for the whole store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreMetadata {
    pub total_count: u64,
    pub last_updated_ms: i64,
    /// Catch-up sync watermark
    pub last_sync_ms: i64,
    pub schema_version: u32,
    pub min_ts_ms: Option<i64>,
    pub max_ts_ms: Option<i64>,
    pub migrations: Vec<AppliedMigration>,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            total_count: 0,
            last_updated_ms: 0,
            last_sync_ms: 0,
            schema_version: 1,
            min_ts_ms: None,
            max_ts_ms: None,
            migrations: Vec::new(),
        }
    }
}

impl StoreMetadata {
    /// Load from the metadata tree, defaulting on first open.
    pub fn load<T: StorageTree + ?Sized>(tree: &T) -> StoreResult<Self> {
        match tree.get(META_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save<T: StorageTree + ?Sized>(&self, tree: &T) -> StoreResult<()> {
        let bytes = bincode::serialize(self)?;
        tree.insert(META_KEY, &bytes)?;
        Ok(())
    }

    /// Fold an observed record timestamp into the min/max watermark.
    pub fn observe_ts(&mut self, ts_ms: i64) {
        self.min_ts_ms = Some(self.min_ts_ms.map_or(ts_ms, |v| v.min(ts_ms)));
        self.max_ts_ms = Some(self.max_ts_ms.map_or(ts_ms, |v| v.max(ts_ms)));
    }

    pub fn touch(&mut self) {
        self.last_updated_ms = chrono::Utc::now().timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::memory::MemoryStorageDriver;
    use crate::store::backend::StorageDriver;

    #[test]
    fn test_metadata_round_trip() {
        let driver = MemoryStorageDriver::new();
        let tree = driver.open_tree(META_TREE).unwrap();

        let mut meta = StoreMetadata::load(&tree).unwrap();
        assert_eq!(meta, StoreMetadata::default());

        meta.total_count = 42;
        meta.schema_version = 3;
        meta.observe_ts(1000);
        meta.observe_ts(500);
        meta.observe_ts(2000);
        meta.save(&tree).unwrap();

        let loaded = StoreMetadata::load(&tree).unwrap();
        assert_eq!(loaded.total_count, 42);
        assert_eq!(loaded.min_ts_ms, Some(500));
        assert_eq!(loaded.max_ts_ms, Some(2000));
    }
}
