// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage driver factory
//!
//! Entry point for creating storage drivers from configuration: takes a
//! storage type and path, returns the driver as a trait object.

use super::traits::{StorageDriver, StorageTree};
use super::types::{StorageResult, StorageType};
use std::path::Path;

#[cfg(not(feature = "sled-backend"))]
use super::types::StorageDriverError;

pub fn create_storage_driver<P: AsRef<Path>>(
    storage_type: StorageType,
    path: P,
) -> StorageResult<Box<dyn StorageDriver<Tree = Box<dyn StorageTree>>>> {
    match storage_type {
        #[cfg(feature = "sled-backend")]
        StorageType::Sled => {
            use super::sled::SledDriver;
            let driver = SledDriver::open(path)?;
            Ok(Box::new(driver) as Box<dyn StorageDriver<Tree = Box<dyn StorageTree>>>)
        }
        #[cfg(not(feature = "sled-backend"))]
        StorageType::Sled => Err(StorageDriverError::Backend(
            "sled backend not compiled in (enable the sled-backend feature)".to_string(),
        )),
        StorageType::Memory => {
            use super::memory::MemoryStorageDriver;
            let driver = MemoryStorageDriver::open(path)?;
            Ok(Box::new(driver) as Box<dyn StorageDriver<Tree = Box<dyn StorageTree>>>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(feature = "sled-backend")]
    #[test]
    fn test_create_sled_driver() {
        let temp_dir = TempDir::new().unwrap();
        let driver = create_storage_driver(StorageType::Sled, temp_dir.path()).unwrap();
        assert_eq!(driver.storage_type(), StorageType::Sled);
    }

    #[test]
    fn test_create_memory_driver() {
        let temp_dir = TempDir::new().unwrap();
        let driver = create_storage_driver(StorageType::Memory, temp_dir.path()).unwrap();
        assert_eq!(driver.storage_type(), StorageType::Memory);
    }
}
