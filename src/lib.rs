// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! TaskLite - a lightweight partitioned analytics store for satellite task
//! records
//!
//! TaskLite keeps large sets of schemaless task records queryable on modest
//! hardware by partitioning them into calendar quarters, indexing them by
//! start time inside each partition, and layering an in-memory query cache
//! and cycle-bucketed aggregation index on top.
//!
//! # Features
//!
//! - **Quarter partitions**: records land in `YYYY_Qn` partitions derived
//!   from their start time; partitions materialize lazily behind a global
//!   migration lock, and range queries prune to overlapping partitions only
//! - **Cycle engine**: day/week/month/quarter bucketing with configurable
//!   window start offsets and literal wall-clock time (no timezone math)
//! - **Layered query cache**: per-query LRU with TTL, a hot-window slot for
//!   recent data, and a full-dataset slot, all invalidated synchronously on
//!   every write
//! - **Result analysis**: failure and success-rate classification with the
//!   domain's intentionally overlapping category sets
//! - **Sync absorption**: a typed event vocabulary and absorber that folds
//!   external change streams into the durable store and the bucket index
//!   consistently
//!
//! # Usage
//!
//! ```no_run
//! use tasklite::store::{StoreConfig, StoreManager};
//!
//! # async fn demo() -> Result<(), tasklite::store::StoreError> {
//! let store = StoreManager::open(StoreConfig::new("./taskdata")).await?;
//! let records = store.get_all_data_fast().await?;
//! println!("{} record(s)", records.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cache;
pub mod cycle;
pub mod index;
pub mod record;
pub mod store;
pub mod sync;

pub use analysis::TaskResultAnalyzer;
pub use cache::{QueryCache, QueryCacheConfig};
pub use cycle::{CycleConfig, CycleRuleEngine, CycleType};
pub use index::{Bucket, BucketStats, DataStore};
pub use record::{FieldConfig, TaskRecord};
pub use store::{QueryOptions, StoreConfig, StoreError, StoreManager};

/// TaskLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, for diagnostics
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
