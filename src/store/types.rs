// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store configuration, query shapes and error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use super::backend::{StorageDriverError, StorageType};
use crate::cache::QueryCacheConfig;
use crate::record::{FieldConfig, RecordError};

/// Error types for partitioned store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Driver(#[from] StorageDriverError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration conflict: {0}")]
    MigrationConflict(String),

    #[error("Partition not materialized: {0}")]
    PartitionNotMaterialized(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Partitioned store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub storage_type: StorageType,
    pub fields: FieldConfig,
    /// Records per write batch; control yields to the event loop between batches
    pub batch_size: usize,
    /// Concurrent partition scans
    pub max_parallel: usize,
    pub cache: QueryCacheConfig,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            storage_type: StorageType::default(),
            fields: FieldConfig::default(),
            batch_size: 10_000,
            max_parallel: 4,
            cache: QueryCacheConfig::default(),
        }
    }

    /// Memory-backed store, for tests
    pub fn in_memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
            ..Self::new("")
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.batch_size == 0 {
            return Err(StoreError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.max_parallel == 0 {
            return Err(StoreError::InvalidConfig(
                "max_parallel must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

/// Options for the optimized range query. Serialized into the cache key, so
/// two queries with different options never share a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryOptions {
    pub use_cache: bool,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order: SortOrder,
    /// Overrides the store-level scan concurrency when set
    pub max_parallel: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            limit: None,
            offset: 0,
            order: SortOrder::Asc,
            max_parallel: None,
        }
    }
}

/// Start/end filter for full-scan queries
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryFilters {
    pub start: Option<chrono::NaiveDateTime>,
    pub end: Option<chrono::NaiveDateTime>,
}

/// Where a record currently lives: its partition and storage key.
/// Persisted in the locator tree so cross-partition moves can clean up the
/// stale copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordLocator {
    pub partition: String,
    pub key: Vec<u8>,
}

/// Progress callback for bulk loads: `(percent, done, total)`
pub type ProgressFn = dyn Fn(u8, usize, usize) + Send + Sync;
