// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema migration: the global migration lock and forward migration steps
//!
//! Partition creation is a schema change and must be mutually exclusive
//! process-wide: two concurrent version bumps corrupt the versioned store.
//! The lock is an explicit object owned (and injectable) by the store
//! manager, acquired asynchronously with a bounded-interval backoff poll.
//! There is no overall deadline; a stuck migration blocks later partition
//! creation, which is an accepted limitation.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::backend::{StorageDriver, StorageTree};
use super::metadata::AppliedMigration;
use super::partition::PartitionKey;
use super::types::{StoreError, StoreResult};

/// Non-reentrant async mutual exclusion for schema migrations
#[derive(Debug)]
pub struct MigrationLock {
    locked: AtomicBool,
    poll_interval: Duration,
    max_interval: Duration,
}

impl Default for MigrationLock {
    fn default() -> Self {
        Self {
            locked: AtomicBool::new(false),
            poll_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(250),
        }
    }
}

impl MigrationLock {
    pub fn new(poll_interval: Duration, max_interval: Duration) -> Self {
        Self {
            locked: AtomicBool::new(false),
            poll_interval,
            max_interval,
        }
    }

    /// Acquire the lock, polling with doubling backoff up to `max_interval`.
    pub async fn acquire(&self) -> MigrationGuard<'_> {
        let mut wait = self.poll_interval;
        loop {
            if self
                .locked
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!("Migration lock acquired");
                return MigrationGuard { lock: self };
            }
            tokio::time::sleep(wait).await;
            wait = (wait * 2).min(self.max_interval);
        }
    }

    /// Non-blocking attempt, for tests and opportunistic callers.
    pub fn try_acquire(&self) -> Option<MigrationGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MigrationGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Releases the migration lock on drop
pub struct MigrationGuard<'a> {
    lock: &'a MigrationLock,
}

impl Drop for MigrationGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        debug!("Migration lock released");
    }
}

/// A single forward migration step: materialize a set of partitions and bump
/// the schema version. Steps are one-way; a step must never run against a
/// store whose version has already passed `from_version`.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub partitions: Vec<PartitionKey>,
}

impl MigrationStep {
    pub fn materialize(partitions: Vec<PartitionKey>, current_version: u32) -> Self {
        Self {
            from_version: current_version,
            to_version: current_version + 1,
            partitions,
        }
    }

    /// Apply the step: create the physical trees. Idempotent — re-opening an
    /// existing tree is a no-op — so a step interrupted midway can be retried.
    ///
    /// The caller must hold the migration lock and must verify the version
    /// precondition with [`MigrationStep::check_version`] first.
    pub fn apply<D>(&self, driver: &D) -> StoreResult<()>
    where
        D: StorageDriver<Tree = Box<dyn StorageTree>> + ?Sized,
    {
        for partition in &self.partitions {
            driver.open_tree(&partition.tree_name())?;
            debug!("Materialized partition {}", partition);
        }
        driver.flush()?;
        info!(
            "Migration v{} -> v{} materialized {} partition(s)",
            self.from_version,
            self.to_version,
            self.partitions.len()
        );
        Ok(())
    }

    pub fn check_version(&self, current_version: u32) -> StoreResult<()> {
        if current_version != self.from_version {
            return Err(StoreError::MigrationConflict(format!(
                "step expects schema version {} but store is at {}",
                self.from_version, current_version
            )));
        }
        Ok(())
    }

    pub fn as_applied(&self) -> AppliedMigration {
        AppliedMigration {
            from_version: self.from_version,
            to_version: self.to_version,
            applied_at_ms: chrono::Utc::now().timestamp_millis(),
            partitions: self.partitions.iter().map(|p| p.to_string()).collect(),
        }
    }
}
