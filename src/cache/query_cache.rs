// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query result caching implementation

use chrono::NaiveDateTime;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::record::{instant_millis, FieldConfig, TaskRecord};

/// Query cache sizing and freshness configuration
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Byte ceiling across all per-query entries
    pub max_bytes: usize,
    /// Entries older than this are treated as misses and evicted on access
    pub ttl: Duration,
    /// Width of the hot-window slot
    pub hot_window_days: i64,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024, // 100MB
            ttl: Duration::from_secs(300), // 5 minutes
            hot_window_days: 7,
        }
    }
}

/// Cache hit/miss counters
#[derive(Debug, Default, Clone)]
pub struct QueryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hot_hits: u64,
    pub full_hits: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub rejected: u64,
    pub invalidations: u64,
}

struct CachedEntry {
    data: Arc<Vec<TaskRecord>>,
    size_bytes: usize,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u32,
}

struct HotSlot {
    data: Arc<Vec<TaskRecord>>,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    loaded_at: Instant,
}

struct FullSlot {
    data: Arc<Vec<TaskRecord>>,
    loaded_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedEntry>,
    total_bytes: usize,
    hot: Option<HotSlot>,
    full: Option<FullSlot>,
    stats: QueryCacheStats,
}

/// Layered read cache for range query results.
///
/// Purely in-process state; mutation is guarded by a single mutex so
/// [`QueryCache::invalidate`] is synchronous relative to any write that could
/// make it stale.
pub struct QueryCache {
    config: QueryCacheConfig,
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    /// Build the cache key for a query shape.
    pub fn query_key<O: Serialize>(
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        options: &O,
    ) -> String {
        let start = start
            .map(|s| instant_millis(s).to_string())
            .unwrap_or_else(|| "all".to_string());
        let end = end
            .map(|e| instant_millis(e).to_string())
            .unwrap_or_else(|| "all".to_string());
        let options = serde_json::to_string(options).unwrap_or_default();
        format!("{}:{}:{}", start, end, options)
    }

    /// Look up a cached result. A hit refreshes the LRU position and access
    /// count; an expired entry is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<TaskRecord>>> {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            Some(entry) => entry.created_at.elapsed() > self.config.ttl,
            None => {
                state.stats.misses += 1;
                return None;
            }
        };

        if expired {
            if let Some(entry) = state.entries.remove(key) {
                state.total_bytes = state.total_bytes.saturating_sub(entry.size_bytes);
                state.stats.evictions += 1;
            }
            state.stats.misses += 1;
            return None;
        }

        let entry = state.entries.get_mut(key)?;
        entry.last_accessed = Instant::now();
        entry.access_count += 1;
        let data = entry.data.clone();
        state.stats.hits += 1;
        Some(data)
    }

    /// Insert a result set, evicting least-recently-accessed entries until it
    /// fits. An entry that alone exceeds the ceiling is rejected, not stored.
    pub fn set(&self, key: String, data: Vec<TaskRecord>) {
        let size_bytes = estimate_size(&data);
        if size_bytes > self.config.max_bytes {
            warn!(
                "Rejecting cache entry of {} bytes (ceiling {} bytes)",
                size_bytes, self.config.max_bytes
            );
            self.state.lock().stats.rejected += 1;
            return;
        }

        let mut state = self.state.lock();
        if let Some(old) = state.entries.remove(&key) {
            state.total_bytes = state.total_bytes.saturating_sub(old.size_bytes);
        }

        while state.total_bytes + size_bytes > self.config.max_bytes {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            match victim {
                Some(victim) => {
                    if let Some(evicted) = state.entries.remove(&victim) {
                        state.total_bytes =
                            state.total_bytes.saturating_sub(evicted.size_bytes);
                        state.stats.evictions += 1;
                        debug!("Evicted cache entry {}", victim);
                    }
                }
                None => break,
            }
        }

        let now = Instant::now();
        state.total_bytes += size_bytes;
        state.entries.insert(
            key,
            CachedEntry {
                data: Arc::new(data),
                size_bytes,
                created_at: now,
                last_accessed: now,
                access_count: 0,
            },
        );
        state.stats.insertions += 1;
    }

    /// Replace the hot-window slot.
    pub fn preload_hot(
        &self,
        data: Vec<TaskRecord>,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) {
        let mut state = self.state.lock();
        state.hot = Some(HotSlot {
            data: Arc::new(data),
            window_start,
            window_end,
            loaded_at: Instant::now(),
        });
    }

    /// True iff the query window is fully contained in the (fresh) hot window.
    /// All-or-nothing; there is no partial-hit fallback.
    pub fn hot_covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let state = self.state.lock();
        match &state.hot {
            Some(hot) => {
                hot.loaded_at.elapsed() <= self.config.ttl
                    && start >= hot.window_start
                    && end <= hot.window_end
            }
            None => false,
        }
    }

    /// Linear timestamp filter over the hot slice. Returns `None` when the
    /// window is not fully covered.
    pub fn filter_from_hot(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        fields: &FieldConfig,
    ) -> Option<Vec<TaskRecord>> {
        if !self.hot_covers(start, end) {
            return None;
        }
        let data = {
            let mut state = self.state.lock();
            state.stats.hot_hits += 1;
            state.hot.as_ref().map(|hot| hot.data.clone())?
        };
        let filtered = data
            .iter()
            .filter(|record| match record.start_time(fields) {
                Ok(at) => at >= start && at <= end,
                Err(_) => false,
            })
            .cloned()
            .collect();
        Some(filtered)
    }

    pub fn set_full(&self, data: Vec<TaskRecord>) {
        let mut state = self.state.lock();
        state.full = Some(FullSlot {
            data: Arc::new(data),
            loaded_at: Instant::now(),
        });
    }

    pub fn get_full(&self) -> Option<Arc<Vec<TaskRecord>>> {
        let mut state = self.state.lock();
        let fresh = state
            .full
            .as_ref()
            .map(|full| full.loaded_at.elapsed() <= self.config.ttl)?;
        if !fresh {
            state.full = None;
            return None;
        }
        state.stats.full_hits += 1;
        state.full.as_ref().map(|full| full.data.clone())
    }

    /// Clear all three layers. Called synchronously on every write path,
    /// before the write resolves to its caller.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_bytes = 0;
        state.hot = None;
        state.full = None;
        state.stats.invalidations += 1;
    }

    pub fn stats(&self) -> QueryCacheStats {
        self.state.lock().stats.clone()
    }

    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Access count for one entry. Test support.
    #[doc(hidden)]
    pub fn entry_access_count(&self, key: &str) -> Option<u32> {
        self.state.lock().entries.get(key).map(|e| e.access_count)
    }
}

fn estimate_size(data: &[TaskRecord]) -> usize {
    serde_json::to_vec(data).map(|v| v.len()).unwrap_or_else(|_| {
        data.len() * std::mem::size_of::<TaskRecord>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, start: &str) -> TaskRecord {
        match json!({"id": id, "start_time": start, "task_result": "正常"}) {
            serde_json::Value::Object(map) => TaskRecord::new(map),
            _ => unreachable!(),
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_get_set_round_trip() {
        let cache = QueryCache::new(QueryCacheConfig::default());
        let key = QueryCache::query_key(Some(at("2024-01-01 00:00:00")), None, &json!({}));
        assert!(cache.get(&key).is_none());
        cache.set(key.clone(), vec![record(1, "2024-01-01 10:00:00")]);
        assert_eq!(cache.get(&key).unwrap().len(), 1);
        assert_eq!(cache.entry_access_count(&key), Some(1));
    }

    #[test]
    fn test_oversized_entry_is_rejected_silently() {
        let cache = QueryCache::new(QueryCacheConfig {
            max_bytes: 16,
            ..Default::default()
        });
        let key = QueryCache::query_key(None, None, &json!({}));
        cache.set(key.clone(), vec![record(1, "2024-01-01 10:00:00")]);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().rejected, 1);
    }

    #[test]
    fn test_lru_eviction_respects_byte_ceiling() {
        let one_entry = estimate_size(&[record(1, "2024-01-01 10:00:00")]);
        let cache = QueryCache::new(QueryCacheConfig {
            max_bytes: one_entry * 2 + 1,
            ..Default::default()
        });

        cache.set("a".to_string(), vec![record(1, "2024-01-01 10:00:00")]);
        std::thread::sleep(Duration::from_millis(5));
        cache.set("b".to_string(), vec![record(2, "2024-01-02 10:00:00")]);
        std::thread::sleep(Duration::from_millis(5));
        // Touch "a" so "b" becomes the LRU victim
        assert!(cache.get("a").is_some());
        std::thread::sleep(Duration::from_millis(5));
        cache.set("c".to_string(), vec![record(3, "2024-01-03 10:00:00")]);

        assert!(cache.total_bytes() <= one_entry * 2 + 1);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_ttl_expiry_counts_as_miss() {
        let cache = QueryCache::new(QueryCacheConfig {
            ttl: Duration::from_millis(10),
            ..Default::default()
        });
        cache.set("k".to_string(), vec![record(1, "2024-01-01 10:00:00")]);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_hot_window_is_all_or_nothing() {
        let cache = QueryCache::new(QueryCacheConfig::default());
        let fields = FieldConfig::default();
        cache.preload_hot(
            vec![record(1, "2024-01-05 10:00:00"), record(2, "2024-01-06 10:00:00")],
            at("2024-01-01 00:00:00"),
            at("2024-01-08 00:00:00"),
        );

        // Fully covered window gets a filtered slice
        let hit = cache
            .filter_from_hot(at("2024-01-05 00:00:00"), at("2024-01-05 23:59:59"), &fields)
            .unwrap();
        assert_eq!(hit.len(), 1);

        // Window extending past the hot range gets nothing
        assert!(cache
            .filter_from_hot(at("2023-12-25 00:00:00"), at("2024-01-05 00:00:00"), &fields)
            .is_none());
    }

    #[test]
    fn test_invalidate_clears_all_layers() {
        let cache = QueryCache::new(QueryCacheConfig::default());
        cache.set("k".to_string(), vec![record(1, "2024-01-01 10:00:00")]);
        cache.set_full(vec![record(1, "2024-01-01 10:00:00")]);
        cache.preload_hot(
            vec![record(1, "2024-01-05 10:00:00")],
            at("2024-01-01 00:00:00"),
            at("2024-01-08 00:00:00"),
        );

        cache.invalidate();

        assert!(cache.get("k").is_none());
        assert!(cache.get_full().is_none());
        assert!(!cache.hot_covers(at("2024-01-02 00:00:00"), at("2024-01-03 00:00:00")));
        assert_eq!(cache.total_bytes(), 0);
    }
}
