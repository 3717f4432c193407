// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled storage driver implementation

use super::traits::{StorageDriver, StorageTree};
use super::types::{StorageDriverError, StorageResult, StorageType};
use std::path::Path;

/// Sled driver implementation
pub struct SledDriver {
    db: sled::Db,
}

/// Sled tree wrapper that implements the StorageTree trait
pub struct SledTree {
    tree: sled::Tree,
}

fn backend_err(e: sled::Error) -> StorageDriverError {
    StorageDriverError::Backend(e.to_string())
}

impl StorageTree for SledTree {
    fn insert(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tree.insert(key, value).map_err(backend_err)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.tree
            .get(key)
            .map_err(backend_err)
            .map(|opt| opt.map(|v| v.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        self.tree.remove(key).map_err(backend_err)?;
        Ok(())
    }

    fn contains_key(&self, key: &[u8]) -> StorageResult<bool> {
        self.tree.contains_key(key).map_err(backend_err)
    }

    fn clear(&self) -> StorageResult<()> {
        self.tree.clear().map_err(backend_err)
    }

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.tree.is_empty())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.tree.len())
    }

    fn iter(
        &self,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>> {
        let iter = self.tree.iter().map(|result| {
            result
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(backend_err)
        });
        Ok(Box::new(iter))
    }

    fn range(
        &self,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<(Vec<u8>, Vec<u8>)>> + '_>> {
        let range = self.tree.range(start.to_vec()..end.to_vec());
        let map = |result: Result<(sled::IVec, sled::IVec), sled::Error>| {
            result
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(backend_err)
        };
        if reverse {
            Ok(Box::new(range.rev().map(map)))
        } else {
            Ok(Box::new(range.map(map)))
        }
    }

    fn batch_insert(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> StorageResult<()> {
        let mut batch = sled::Batch::default();
        for (key, value) in entries {
            batch.insert(key.as_slice(), value.as_slice());
        }
        self.tree.apply_batch(batch).map_err(backend_err)?;
        Ok(())
    }

    fn batch_remove(&self, keys: &[Vec<u8>]) -> StorageResult<()> {
        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key.as_slice());
        }
        self.tree.apply_batch(batch).map_err(backend_err)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.tree.flush().map_err(backend_err)?;
        Ok(())
    }
}

impl StorageDriver for SledDriver {
    type Tree = Box<dyn StorageTree>;

    fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path).map_err(backend_err)?;
        Ok(SledDriver { db })
    }

    fn open_tree(&self, name: &str) -> StorageResult<Self::Tree> {
        let tree = self.db.open_tree(name).map_err(backend_err)?;
        Ok(Box::new(SledTree { tree }) as Box<dyn StorageTree>)
    }

    fn drop_tree(&self, name: &str) -> StorageResult<()> {
        self.db.drop_tree(name.as_bytes()).map_err(backend_err)?;
        Ok(())
    }

    fn list_trees(&self) -> StorageResult<Vec<String>> {
        let tree_names = self
            .db
            .tree_names()
            .into_iter()
            .map(|name| String::from_utf8_lossy(&name).to_string())
            .filter(|name| name != "__sled__default")
            .collect();
        Ok(tree_names)
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Sled
    }
}
