// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory time-bucketed secondary index
//!
//! Groups records into cycle-engine-derived buckets and maintains a
//! bidirectional record/bucket index so single-record insert, update and
//! delete stay O(1) and bucket-scoped re-aggregation only touches the
//! affected buckets.

pub mod bucket;
pub mod data_store;

pub use bucket::{Bucket, BucketStats};
pub use data_store::{DataStore, LoadReport};
