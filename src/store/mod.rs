// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Durable record storage
//!
//! Submodules: pluggable key-value [`backend`]s, quarter [`partition`]
//! addressing, store [`metadata`], the [`migration`] lock and steps, and the
//! [`manager`] tying them together.

pub mod backend;
pub mod manager;
pub mod metadata;
pub mod migration;
pub mod partition;
pub mod types;

pub use backend::{
    create_storage_driver, StorageDriver, StorageDriverError, StorageResult, StorageTree,
    StorageType,
};
pub use manager::StoreManager;
pub use metadata::{AppliedMigration, StoreMetadata};
pub use migration::{MigrationGuard, MigrationLock, MigrationStep};
pub use partition::{record_key, PartitionKey, PartitionState};
pub use types::{
    ProgressFn, QueryFilters, QueryOptions, RecordLocator, SortOrder, StoreConfig, StoreError,
    StoreResult,
};
