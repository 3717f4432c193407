// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage backend drivers
//!
//! The persistent store is expressed against the [`StorageDriver`] and
//! [`StorageTree`] traits: named trees of byte key-value pairs with ordered
//! range scans over the key space. Record keys embed the record timestamp,
//! so a key range scan is a timestamp index scan.

pub mod factory;
pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled;
pub mod traits;
pub mod types;

pub use factory::create_storage_driver;
pub use traits::{StorageDriver, StorageTree};
pub use types::{StorageDriverError, StorageResult, StorageType};
