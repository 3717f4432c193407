// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Folding sync events into the durable store and the bucket index

use log::{debug, warn};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;

use super::events::{ChangeOp, SyncEvent};
use super::SyncResult;
use crate::cycle::{CycleRuleEngine, CycleType};
use crate::index::DataStore;
use crate::record::TaskRecord;
use crate::store::StoreManager;

/// Result of a best-effort catch-up pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatchUpOutcome {
    pub has_new_data: bool,
    pub count: usize,
}

/// Absorbs change events into both stores consistently.
///
/// Every absorbed change hits the durable [`StoreManager`] first, then the
/// in-memory [`DataStore`], so a crash between the two loses only the
/// rebuildable index. Returns the bucket keys each change touched so the
/// caller can re-aggregate incrementally.
pub struct SyncAbsorber {
    store: StoreManager,
    index: Arc<RwLock<DataStore>>,
    engine: CycleRuleEngine,
    cycle: CycleType,
}

impl SyncAbsorber {
    pub fn new(
        store: StoreManager,
        index: Arc<RwLock<DataStore>>,
        engine: CycleRuleEngine,
        cycle: CycleType,
    ) -> Self {
        Self {
            store,
            index,
            engine,
            cycle,
        }
    }

    pub fn cycle(&self) -> CycleType {
        self.cycle
    }

    /// Absorb one event. Non-change events (load notifications, data
    /// requests) are not this component's concern and touch nothing.
    pub async fn absorb(&self, event: &SyncEvent) -> SyncResult<Vec<String>> {
        match event {
            SyncEvent::DataChange { op, record } => self.handle_data_change(*op, record).await,
            SyncEvent::BatchUpdate { records } => self.handle_batch_update(records).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn handle_data_change(&self, op: ChangeOp, record: &TaskRecord) -> SyncResult<Vec<String>> {
        let is_delete = op == ChangeOp::Delete;
        if is_delete {
            let fields = self.store.fields();
            let identity = record.identity_key(fields)?;
            let ts_hint = record.start_time(fields).ok();
            self.store.delete_record(&identity, ts_hint).await?;
        } else {
            let written = self.store.update_record(record).await?;
            if !written {
                debug!("Change landed in an unmaterialized partition; index only");
            }
        }
        let touched = self
            .index
            .write()
            .update_record(record, &self.engine, self.cycle, is_delete);
        Ok(touched)
    }

    async fn handle_batch_update(&self, records: &[TaskRecord]) -> SyncResult<Vec<String>> {
        self.store.batch_update_records(records.to_vec()).await?;
        let mut touched = Vec::new();
        {
            let mut index = self.index.write();
            for record in records {
                for key in index.update_record(record, &self.engine, self.cycle, false) {
                    if !touched.contains(&key) {
                        touched.push(key);
                    }
                }
            }
        }
        Ok(touched)
    }

    /// Best-effort catch-up since the persisted watermark.
    ///
    /// `fetch` is handed the last-sync watermark in epoch milliseconds and
    /// returns the records changed since then. Fetch or absorption failures
    /// are swallowed and reported as "no new data"; a sync gap is recoverable,
    /// a crashed caller is not.
    pub async fn catch_up<F, Fut>(&self, fetch: F) -> CatchUpOutcome
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = SyncResult<Vec<TaskRecord>>>,
    {
        let since = self.store.last_sync_ms();
        let records = match fetch(since).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Catch-up fetch failed: {}", e);
                return CatchUpOutcome::default();
            }
        };
        if records.is_empty() {
            return CatchUpOutcome::default();
        }

        let count = records.len();
        if let Err(e) = self.handle_batch_update(&records).await {
            warn!("Catch-up absorption failed: {}", e);
            return CatchUpOutcome::default();
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        if let Err(e) = self.store.set_last_sync_ms(now_ms) {
            warn!("Failed to persist sync watermark: {}", e);
        }
        CatchUpOutcome {
            has_new_data: true,
            count,
        }
    }
}
