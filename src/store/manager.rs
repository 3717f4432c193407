// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store manager - the durable, partitioned, schema-versioned record store
//!
//! Records live in lazily-materialized quarter partitions, keyed inside each
//! partition by timestamp so range queries are index scans. Reads go through
//! the layered [`QueryCache`]; every write path invalidates it synchronously
//! before resolving. Partition creation is serialized behind the global
//! [`MigrationLock`].

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::backend::{create_storage_driver, StorageDriver, StorageTree};
use super::metadata::{StoreMetadata, LOCATOR_TREE, META_TREE};
use super::migration::{MigrationLock, MigrationStep};
use super::partition::{
    range_lower_bound, range_upper_bound, record_key, PartitionKey, PartitionState,
};
use super::types::{
    ProgressFn, QueryFilters, QueryOptions, RecordLocator, SortOrder, StoreConfig, StoreError,
    StoreResult,
};
use crate::cache::QueryCache;
use crate::record::{instant_millis, FieldConfig, TaskRecord};

type DynDriver = Box<dyn StorageDriver<Tree = Box<dyn StorageTree>>>;

/// A record parsed for writing: storage key, identity, timestamp, payload
struct WriteItem {
    key: Vec<u8>,
    identity: String,
    ts_ms: i64,
    record: TaskRecord,
}

/// Durable partitioned store of task records.
///
/// Cheaply cloneable; all state is shared behind `Arc`s so background
/// append tasks can hold their own handle.
#[derive(Clone)]
pub struct StoreManager {
    driver: Arc<DynDriver>,
    config: StoreConfig,
    partitions: Arc<RwLock<HashMap<PartitionKey, PartitionState>>>,
    metadata: Arc<RwLock<StoreMetadata>>,
    cache: Arc<QueryCache>,
    migration_lock: Arc<MigrationLock>,
}

impl StoreManager {
    /// Open the store, recovering partition registry and metadata.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_lock(config, Arc::new(MigrationLock::default())).await
    }

    /// Open with an injected migration lock (shared across managers in tests).
    pub async fn open_with_lock(
        config: StoreConfig,
        migration_lock: Arc<MigrationLock>,
    ) -> StoreResult<Self> {
        config.validate()?;
        let driver: Arc<DynDriver> =
            Arc::new(create_storage_driver(config.storage_type, &config.path)?);

        let meta_tree = driver.open_tree(META_TREE)?;
        let metadata = StoreMetadata::load(&meta_tree)?;

        // Existing partition trees are materialized from a previous session
        let mut partitions = HashMap::new();
        for name in driver.list_trees()? {
            if let Some(key) = PartitionKey::from_tree_name(&name) {
                partitions.insert(key, PartitionState::Materialized);
            }
        }

        info!(
            "Opened {} store at {:?}: schema v{}, {} partition(s), {} record(s)",
            driver.storage_type(),
            config.path,
            metadata.schema_version,
            partitions.len(),
            metadata.total_count
        );

        let cache = Arc::new(QueryCache::new(config.cache.clone()));
        Ok(Self {
            driver,
            config,
            partitions: Arc::new(RwLock::new(partitions)),
            metadata: Arc::new(RwLock::new(metadata)),
            cache,
            migration_lock,
        })
    }

    pub fn fields(&self) -> &FieldConfig {
        &self.config.fields
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn metadata(&self) -> StoreMetadata {
        self.metadata.read().clone()
    }

    pub fn is_materialized(&self, key: PartitionKey) -> bool {
        matches!(
            self.partitions.read().get(&key),
            Some(PartitionState::Materialized)
        )
    }

    /// Materialized partitions in chronological order.
    pub fn materialized_partitions(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<PartitionKey> = self
            .partitions
            .read()
            .iter()
            .filter(|(_, state)| **state == PartitionState::Materialized)
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    /// Catch-up sync watermark accessors.
    pub fn last_sync_ms(&self) -> i64 {
        self.metadata.read().last_sync_ms
    }

    pub fn set_last_sync_ms(&self, ms: i64) -> StoreResult<()> {
        {
            let mut meta = self.metadata.write();
            meta.last_sync_ms = ms;
        }
        self.save_metadata()
    }

    /// Replace the entire dataset.
    ///
    /// Clears existing partitions, sorts the records by start time, groups
    /// them by partition, materializes every needed partition in a single
    /// migration (one version bump, not one per partition) and writes in
    /// fixed-size batches, yielding to the event loop between batches.
    pub async fn store_all_data(
        &self,
        records: Vec<TaskRecord>,
        progress: Option<&ProgressFn>,
    ) -> StoreResult<usize> {
        self.clear_all_data().await?;

        let mut items = self.parse_for_write(records);
        items.sort_by_key(|item| item.ts_ms);
        let total = items.len();
        let groups = group_by_partition(items);

        self.ensure_partitions(groups.keys().copied().collect())
            .await?;

        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;
        let mut done = 0usize;
        let mut min_ts = None::<i64>;
        let mut max_ts = None::<i64>;

        for (partition, items) in &groups {
            let tree = self.driver.open_tree(&partition.tree_name())?;
            for chunk in items.chunks(self.config.batch_size) {
                self.write_chunk(&tree, &locator_tree, partition, chunk)?;
                for item in chunk {
                    min_ts = Some(min_ts.map_or(item.ts_ms, |v: i64| v.min(item.ts_ms)));
                    max_ts = Some(max_ts.map_or(item.ts_ms, |v: i64| v.max(item.ts_ms)));
                }
                done += chunk.len();
                if let Some(progress) = progress {
                    let percent = if total == 0 {
                        100
                    } else {
                        (done * 100 / total) as u8
                    };
                    progress(percent, done, total);
                }
                // Long imports must not starve the host event loop
                tokio::task::yield_now().await;
            }
        }

        {
            let mut meta = self.metadata.write();
            meta.total_count = done as u64;
            meta.min_ts_ms = min_ts;
            meta.max_ts_ms = max_ts;
            meta.touch();
        }
        self.save_metadata()?;
        self.cache.invalidate();
        info!("Stored {} record(s) across {} partition(s)", done, groups.len());
        Ok(done)
    }

    /// Full scan with literal wall-clock filtering, ascending by time.
    pub async fn query_all_data(&self, filters: QueryFilters) -> StoreResult<Vec<TaskRecord>> {
        let partitions = self.materialized_partitions();
        let mut records = self
            .scan_partitions(partitions, None, false, None, self.config.max_parallel)
            .await?;

        let fields = self.config.fields.clone();
        records.retain(|record| match record.start_time(&fields) {
            Ok(at) => {
                filters.start.map_or(true, |s| at >= s) && filters.end.map_or(true, |e| at <= e)
            }
            Err(_) => false,
        });
        self.sort_records(&mut records, SortOrder::Asc);
        Ok(records)
    }

    /// Whole dataset, cached: parallel partition scan merged and sorted,
    /// short-circuited by the full-dataset cache slot.
    pub async fn get_all_data_fast(&self) -> StoreResult<Vec<TaskRecord>> {
        if let Some(hit) = self.cache.get_full() {
            debug!("get_all_data_fast served from full-dataset cache");
            return Ok((*hit).clone());
        }

        let partitions = self.materialized_partitions();
        let mut records = self
            .scan_partitions(partitions, None, false, None, self.config.max_parallel)
            .await?;
        self.sort_records(&mut records, SortOrder::Asc);
        self.cache.set_full(records.clone());
        Ok(records)
    }

    /// The hot read path: hot-window cache, then query cache, then a
    /// partition-pruned parallel index scan with early exit at offset+limit.
    pub async fn query_date_range_optimized(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        opts: QueryOptions,
    ) -> StoreResult<Vec<TaskRecord>> {
        let cache_key = QueryCache::query_key(Some(start), Some(end), &opts);

        if opts.use_cache {
            if let Some(mut hot) = self.cache.filter_from_hot(start, end, &self.config.fields) {
                debug!("Range query served from hot window");
                self.sort_records(&mut hot, opts.order);
                return Ok(paginate(hot, opts.offset, opts.limit));
            }
            if let Some(hit) = self.cache.get(&cache_key) {
                debug!("Range query served from query cache");
                return Ok((*hit).clone());
            }
        }

        // Smart pruning: only partitions whose quarter overlaps the window
        let mut partitions: Vec<PartitionKey> = self
            .materialized_partitions()
            .into_iter()
            .filter(|p| p.overlaps(Some(start), Some(end)))
            .collect();
        if opts.order == SortOrder::Desc {
            partitions.reverse();
        }

        let bounds = (range_lower_bound(start), range_upper_bound(end));
        let target = opts.limit.map(|limit| opts.offset + limit);
        let max_parallel = opts.max_parallel.unwrap_or(self.config.max_parallel);

        let mut records = self
            .scan_partitions(
                partitions,
                Some(bounds),
                opts.order == SortOrder::Desc,
                target,
                max_parallel,
            )
            .await?;

        self.sort_records(&mut records, opts.order);
        let page = paginate(records, opts.offset, opts.limit);
        if opts.use_cache {
            self.cache.set(cache_key, page.clone());
        }
        Ok(page)
    }

    /// Upsert one record, routed by its (possibly new) timestamp.
    ///
    /// Returns `Ok(false)` without writing when the target partition is not
    /// materialized. When the record's time moved it across a partition
    /// boundary, the stale copy in the old partition is removed explicitly:
    /// the record-locator index remembers where each identity last lived.
    pub async fn update_record(&self, record: &TaskRecord) -> StoreResult<bool> {
        let (ts, identity) = self.record_meta(record)?;
        let partition = PartitionKey::from_instant(ts);
        if !self.is_materialized(partition) {
            warn!(
                "Dropping update for record {}: partition {} not materialized",
                identity, partition
            );
            return Ok(false);
        }

        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;
        let new_key = record_key(ts, &identity);
        let is_new = self.remove_stale_copy(&locator_tree, &identity, partition, &new_key)?;

        let tree = self.driver.open_tree(&partition.tree_name())?;
        tree.insert(&new_key, &serde_json::to_vec(record)?)?;
        let locator = RecordLocator {
            partition: partition.to_string(),
            key: new_key,
        };
        locator_tree.insert(identity.as_bytes(), &bincode::serialize(&locator)?)?;

        {
            let mut meta = self.metadata.write();
            if is_new {
                meta.total_count += 1;
            }
            meta.observe_ts(instant_millis(ts));
            meta.touch();
        }
        self.save_metadata()?;
        // Invalidate before resolving so no reader can see pre-write state
        self.cache.invalidate();
        Ok(true)
    }

    /// Batched upsert: grouped by destination partition, one batch write per
    /// partition, a single cache invalidation at the end. Missing partitions
    /// are materialized in one migration.
    pub async fn batch_update_records(&self, records: Vec<TaskRecord>) -> StoreResult<usize> {
        let items = self.parse_for_write(records);
        let groups = group_by_partition(items);
        self.ensure_partitions(groups.keys().copied().collect())
            .await?;

        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;
        let mut updated = 0usize;
        let mut new_records = 0u64;
        let mut min_ts = None::<i64>;
        let mut max_ts = None::<i64>;

        for (partition, items) in &groups {
            let tree = self.driver.open_tree(&partition.tree_name())?;
            for item in items {
                let is_new =
                    self.remove_stale_copy(&locator_tree, &item.identity, *partition, &item.key)?;
                if is_new {
                    new_records += 1;
                }
                min_ts = Some(min_ts.map_or(item.ts_ms, |v: i64| v.min(item.ts_ms)));
                max_ts = Some(max_ts.map_or(item.ts_ms, |v: i64| v.max(item.ts_ms)));
            }
            self.write_chunk(&tree, &locator_tree, partition, items)?;
            updated += items.len();
        }

        {
            let mut meta = self.metadata.write();
            meta.total_count += new_records;
            if let Some(ts) = min_ts {
                meta.observe_ts(ts);
            }
            if let Some(ts) = max_ts {
                meta.observe_ts(ts);
            }
            meta.touch();
        }
        self.save_metadata()?;
        self.cache.invalidate();
        Ok(updated)
    }

    /// Delete by identity. The locator index is the fast path; a timestamp
    /// hint addresses the derived partition directly; otherwise every
    /// partition is searched in turn.
    pub async fn delete_record(
        &self,
        identity: &str,
        ts_hint: Option<NaiveDateTime>,
    ) -> StoreResult<bool> {
        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;

        if let Some(bytes) = locator_tree.get(identity.as_bytes())? {
            let locator: RecordLocator = bincode::deserialize(&bytes)?;
            if let Some(partition) = PartitionKey::parse(&locator.partition) {
                if self.is_materialized(partition) {
                    let tree = self.driver.open_tree(&partition.tree_name())?;
                    tree.remove(&locator.key)?;
                }
            }
            locator_tree.remove(identity.as_bytes())?;
            self.note_deletion()?;
            return Ok(true);
        }

        if let Some(ts) = ts_hint {
            let partition = PartitionKey::from_instant(ts);
            if self.is_materialized(partition) {
                let tree = self.driver.open_tree(&partition.tree_name())?;
                let key = record_key(ts, identity);
                if tree.contains_key(&key)? {
                    tree.remove(&key)?;
                    self.note_deletion()?;
                    return Ok(true);
                }
            }
        }

        // Linear fallback, O(partitions)
        let suffix = format!("_{}", identity).into_bytes();
        for partition in self.materialized_partitions() {
            let tree = self.driver.open_tree(&partition.tree_name())?;
            let mut found = None;
            for item in tree.iter()? {
                let (key, _) = item?;
                if key.ends_with(&suffix) {
                    found = Some(key);
                    break;
                }
            }
            if let Some(key) = found {
                tree.remove(&key)?;
                self.note_deletion()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Incremental append for background and historical loads.
    ///
    /// Records whose partition already exists are written synchronously and
    /// counted in the return value. Records needing a new partition are
    /// materialized and written by a detached background task and are NOT
    /// included in the returned count.
    pub async fn append_data(&self, records: Vec<TaskRecord>) -> StoreResult<usize> {
        let items = self.parse_for_write(records);
        let groups = group_by_partition(items);

        let mut deferred: BTreeMap<PartitionKey, Vec<WriteItem>> = BTreeMap::new();
        let mut written = 0usize;
        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;

        for (partition, items) in groups {
            if self.is_materialized(partition) {
                let tree = self.driver.open_tree(&partition.tree_name())?;
                for chunk in items.chunks(self.config.batch_size) {
                    self.write_chunk(&tree, &locator_tree, &partition, chunk)?;
                    written += chunk.len();
                    tokio::task::yield_now().await;
                }
                self.observe_items(&items, items.len() as u64)?;
            } else {
                deferred.insert(partition, items);
            }
        }

        if !deferred.is_empty() {
            let deferred_count: usize = deferred.values().map(Vec::len).sum();
            debug!(
                "Deferring {} record(s) to background materialization of {} partition(s)",
                deferred_count,
                deferred.len()
            );
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(e) = manager.append_deferred(deferred).await {
                    error!("Background append failed: {}", e);
                }
            });
        }

        self.cache.invalidate();
        Ok(written)
    }

    /// Drop all partitions and reset metadata counters. Schema version and
    /// migration history survive; versions only move forward.
    pub async fn clear_all_data(&self) -> StoreResult<()> {
        let _guard = self.migration_lock.acquire().await;

        let keys: Vec<PartitionKey> = self.partitions.read().keys().copied().collect();
        for key in &keys {
            self.driver.drop_tree(&key.tree_name())?;
        }
        self.driver.open_tree(LOCATOR_TREE)?.clear()?;
        self.partitions.write().clear();

        {
            let mut meta = self.metadata.write();
            meta.total_count = 0;
            meta.min_ts_ms = None;
            meta.max_ts_ms = None;
            meta.touch();
        }
        self.save_metadata()?;
        self.cache.invalidate();
        info!("Cleared {} partition(s)", keys.len());
        Ok(())
    }

    /// Refresh the hot-window cache slot with the most recent N days,
    /// anchored at the newest stored timestamp.
    pub async fn preload_hot_data(&self) -> StoreResult<usize> {
        let window_end = self
            .metadata
            .read()
            .max_ts_ms
            .and_then(crate::record::instant_from_millis)
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let window_start = window_end - chrono::Duration::days(self.cache.config().hot_window_days);

        let partitions: Vec<PartitionKey> = self
            .materialized_partitions()
            .into_iter()
            .filter(|p| p.overlaps(Some(window_start), Some(window_end)))
            .collect();
        let bounds = (
            range_lower_bound(window_start),
            range_upper_bound(window_end),
        );
        let mut records = self
            .scan_partitions(partitions, Some(bounds), false, None, self.config.max_parallel)
            .await?;
        self.sort_records(&mut records, SortOrder::Asc);
        let count = records.len();
        self.cache.preload_hot(records, window_start, window_end);
        debug!("Preloaded {} record(s) into hot window", count);
        Ok(count)
    }

    // ---- internals -------------------------------------------------------

    /// Materialize any unmaterialized partitions in a single migration step.
    async fn ensure_partitions(&self, needed: Vec<PartitionKey>) -> StoreResult<()> {
        {
            let mut registry = self.partitions.write();
            for key in &needed {
                registry.entry(*key).or_insert(PartitionState::Registered);
            }
        }
        let pending: Vec<PartitionKey> = {
            let registry = self.partitions.read();
            needed
                .iter()
                .filter(|k| registry.get(k) != Some(&PartitionState::Materialized))
                .copied()
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        let _guard = self.migration_lock.acquire().await;

        // Another task may have materialized some while we waited
        let pending: Vec<PartitionKey> = {
            let registry = self.partitions.read();
            pending
                .into_iter()
                .filter(|k| registry.get(k) != Some(&PartitionState::Materialized))
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        let current_version = self.metadata.read().schema_version;
        let step = MigrationStep::materialize(pending.clone(), current_version);
        step.check_version(current_version)?;

        {
            let mut registry = self.partitions.write();
            for key in &pending {
                registry.insert(*key, PartitionState::Locked);
            }
        }

        match step.apply(&**self.driver) {
            Ok(()) => {
                let mut registry = self.partitions.write();
                for key in &pending {
                    registry.insert(*key, PartitionState::Materialized);
                }
                drop(registry);
                {
                    let mut meta = self.metadata.write();
                    meta.schema_version = step.to_version;
                    meta.migrations.push(step.as_applied());
                    meta.touch();
                }
                self.save_metadata()
            }
            Err(e) => {
                // Failed partitions stay unmaterialized; writes to them must
                // fail clearly until a retry succeeds
                let mut registry = self.partitions.write();
                for key in &pending {
                    registry.insert(*key, PartitionState::Registered);
                }
                Err(e)
            }
        }
    }

    async fn append_deferred(
        &self,
        groups: BTreeMap<PartitionKey, Vec<WriteItem>>,
    ) -> StoreResult<()> {
        self.ensure_partitions(groups.keys().copied().collect())
            .await?;
        let locator_tree = self.driver.open_tree(LOCATOR_TREE)?;
        for (partition, items) in &groups {
            let tree = self.driver.open_tree(&partition.tree_name())?;
            for chunk in items.chunks(self.config.batch_size) {
                self.write_chunk(&tree, &locator_tree, partition, chunk)?;
                tokio::task::yield_now().await;
            }
            self.observe_items(items, items.len() as u64)?;
        }
        self.cache.invalidate();
        Ok(())
    }

    /// Parse records for writing, skipping (with a warning) any whose time
    /// or identity cannot be resolved.
    fn parse_for_write(&self, records: Vec<TaskRecord>) -> Vec<WriteItem> {
        let fields = &self.config.fields;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let identity = match record.identity_key(fields) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Skipping record without identity: {}", e);
                    continue;
                }
            };
            let ts = match record.start_time(fields) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!("Skipping record {}: {}", identity, e);
                    continue;
                }
            };
            items.push(WriteItem {
                key: record_key(ts, &identity),
                identity,
                ts_ms: instant_millis(ts),
                record,
            });
        }
        items
    }

    fn write_chunk(
        &self,
        tree: &dyn StorageTree,
        locator_tree: &dyn StorageTree,
        partition: &PartitionKey,
        chunk: &[WriteItem],
    ) -> StoreResult<()> {
        let mut entries = Vec::with_capacity(chunk.len());
        let mut locators = Vec::with_capacity(chunk.len());
        for item in chunk {
            entries.push((item.key.clone(), serde_json::to_vec(&item.record)?));
            let locator = RecordLocator {
                partition: partition.to_string(),
                key: item.key.clone(),
            };
            locators.push((
                item.identity.clone().into_bytes(),
                bincode::serialize(&locator)?,
            ));
        }
        tree.batch_insert(&entries)?;
        locator_tree.batch_insert(&locators)?;
        Ok(())
    }

    /// Remove a stale copy of the record if its locator points somewhere
    /// other than the new location. Returns true when the identity was not
    /// previously stored.
    fn remove_stale_copy(
        &self,
        locator_tree: &dyn StorageTree,
        identity: &str,
        new_partition: PartitionKey,
        new_key: &[u8],
    ) -> StoreResult<bool> {
        let Some(bytes) = locator_tree.get(identity.as_bytes())? else {
            return Ok(true);
        };
        let old: RecordLocator = bincode::deserialize(&bytes)?;
        if old.partition != new_partition.to_string() || old.key != new_key {
            if let Some(old_partition) = PartitionKey::parse(&old.partition) {
                if self.is_materialized(old_partition) {
                    let tree = self.driver.open_tree(&old_partition.tree_name())?;
                    tree.remove(&old.key)?;
                    debug!(
                        "Removed stale copy of {} from partition {}",
                        identity, old_partition
                    );
                }
            }
        }
        Ok(false)
    }

    fn observe_items(&self, items: &[WriteItem], added: u64) -> StoreResult<()> {
        {
            let mut meta = self.metadata.write();
            meta.total_count += added;
            for item in items {
                meta.observe_ts(item.ts_ms);
            }
            meta.touch();
        }
        self.save_metadata()
    }

    fn note_deletion(&self) -> StoreResult<()> {
        {
            let mut meta = self.metadata.write();
            meta.total_count = meta.total_count.saturating_sub(1);
            meta.touch();
        }
        self.save_metadata()?;
        self.cache.invalidate();
        Ok(())
    }

    fn save_metadata(&self) -> StoreResult<()> {
        let meta = self.metadata.read().clone();
        let tree = self.driver.open_tree(META_TREE)?;
        meta.save(&tree)
    }

    fn record_meta(&self, record: &TaskRecord) -> StoreResult<(NaiveDateTime, String)> {
        let identity = record.identity_key(&self.config.fields)?;
        let ts = record.start_time(&self.config.fields)?;
        Ok((ts, identity))
    }

    fn sort_records(&self, records: &mut [TaskRecord], order: SortOrder) {
        let fields = &self.config.fields;
        records.sort_by_key(|record| {
            record
                .start_time(fields)
                .map(instant_millis)
                .unwrap_or(i64::MIN)
        });
        if order == SortOrder::Desc {
            records.reverse();
        }
    }

    /// Scan partitions in the given order, `max_parallel` at a time, with an
    /// optional per-scan key range and an overall early-exit target.
    async fn scan_partitions(
        &self,
        partitions: Vec<PartitionKey>,
        bounds: Option<(Vec<u8>, Vec<u8>)>,
        reverse: bool,
        target: Option<usize>,
        max_parallel: usize,
    ) -> StoreResult<Vec<TaskRecord>> {
        let mut merged = Vec::new();
        for chunk in partitions.chunks(max_parallel.max(1)) {
            let mut handles = Vec::with_capacity(chunk.len());
            for partition in chunk {
                let driver = Arc::clone(&self.driver);
                let partition = *partition;
                let bounds = bounds.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    scan_partition(&**driver, partition, bounds, reverse, target)
                }));
            }
            for handle in handles {
                let records = handle
                    .await
                    .map_err(|e| StoreError::Task(e.to_string()))??;
                merged.extend(records);
            }
            if let Some(target) = target {
                if merged.len() >= target {
                    break;
                }
            }
        }
        Ok(merged)
    }
}

fn scan_partition(
    driver: &dyn StorageDriver<Tree = Box<dyn StorageTree>>,
    partition: PartitionKey,
    bounds: Option<(Vec<u8>, Vec<u8>)>,
    reverse: bool,
    limit: Option<usize>,
) -> StoreResult<Vec<TaskRecord>> {
    let tree = driver.open_tree(&partition.tree_name())?;
    let iter = match &bounds {
        Some((lo, hi)) => tree.range(lo, hi, reverse)?,
        None => tree.iter()?,
    };
    let mut records = Vec::new();
    for item in iter {
        let (_, value) = item?;
        records.push(serde_json::from_slice(&value)?);
        if let Some(limit) = limit {
            if records.len() >= limit {
                break;
            }
        }
    }
    Ok(records)
}

fn group_by_partition(items: Vec<WriteItem>) -> BTreeMap<PartitionKey, Vec<WriteItem>> {
    let mut groups: BTreeMap<PartitionKey, Vec<WriteItem>> = BTreeMap::new();
    for item in items {
        let at = crate::record::instant_from_millis(item.ts_ms)
            .unwrap_or_default();
        groups
            .entry(PartitionKey::from_instant(at))
            .or_default()
            .push(item);
    }
    groups
}

fn paginate(records: Vec<TaskRecord>, offset: usize, limit: Option<usize>) -> Vec<TaskRecord> {
    let iter = records.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
