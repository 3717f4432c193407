// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage driver traits
//!
//! All storage backends implement these traits to provide a consistent
//! interface. Keys within a tree are ordered bytewise; [`StorageTree::range`]
//! is the cursor primitive the partition store builds its timestamp index
//! scans on.

use super::types::{StorageResult, StorageType};
use std::path::Path;

/// A named, ordered collection of key-value pairs within a storage driver
pub trait StorageTree: Send + Sync {
    /// Insert a key-value pair (upsert)
    fn insert(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Get a value by key
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Remove a key-value pair
    fn remove(&self, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists
    fn contains_key(&self, key: &[u8]) -> StorageResult<bool>;

    /// Clear all data in the tree
    fn clear(&self) -> StorageResult<()>;

    /// Check if the tree is empty
    fn is_empty(&self) -> StorageResult<bool>;

    /// Number of entries
    fn len(&self) -> StorageResult<usize>;

    /// Iterate over all key-value pairs in key order
    fn iter(
        &self,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>>;

    /// Ordered scan over `[start, end)`, forward or reverse
    fn range(
        &self,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>>;

    /// Insert multiple key-value pairs atomically with respect to readers of
    /// this tree
    fn batch_insert(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> StorageResult<()>;

    /// Remove multiple keys
    fn batch_remove(&self, keys: &[Vec<u8>]) -> StorageResult<()>;

    /// Flush any pending writes to disk
    fn flush(&self) -> StorageResult<()>;
}

/// Main storage driver trait
pub trait StorageDriver: Send + Sync {
    /// Type of tree used by this driver
    type Tree: StorageTree;

    /// Open or create a storage driver at the given path
    fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self>
    where
        Self: Sized;

    /// Open or create a named tree
    fn open_tree(&self, name: &str) -> StorageResult<Self::Tree>;

    /// Drop a named tree and all its data
    fn drop_tree(&self, name: &str) -> StorageResult<()>;

    /// List all existing trees
    fn list_trees(&self) -> StorageResult<Vec<String>>;

    /// Flush all pending writes to disk
    fn flush(&self) -> StorageResult<()>;

    /// Get storage type
    fn storage_type(&self) -> StorageType;
}

// Helper implementation for Box<dyn StorageTree> so boxed trait objects can
// be used seamlessly where the trait is expected.
impl StorageTree for Box<dyn StorageTree> {
    fn insert(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        (**self).insert(key, value)
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn contains_key(&self, key: &[u8]) -> StorageResult<bool> {
        (**self).contains_key(key)
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }

    fn is_empty(&self) -> StorageResult<bool> {
        (**self).is_empty()
    }

    fn len(&self) -> StorageResult<usize> {
        (**self).len()
    }

    fn iter(
        &self,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>> {
        (**self).iter()
    }

    fn range(
        &self,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>> {
        (**self).range(start, end, reverse)
    }

    fn batch_insert(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> StorageResult<()> {
        (**self).batch_insert(entries)
    }

    fn batch_remove(&self, keys: &[Vec<u8>]) -> StorageResult<()> {
        (**self).batch_remove(keys)
    }

    fn flush(&self) -> StorageResult<()> {
        (**self).flush()
    }
}
