// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Layered in-process read cache
//!
//! Three layers, all TTL-boxed and cleared together on every write:
//! - a per-query-shape LRU cache with byte-size accounting and eviction
//! - a single hot-window slot holding the most recent N days
//! - a single full-dataset snapshot slot

pub mod query_cache;

pub use query_cache::{QueryCache, QueryCacheConfig, QueryCacheStats};
