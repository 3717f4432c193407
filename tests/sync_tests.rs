// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! End-to-end sync absorption tests
//!
//! Events arrive on the in-memory bus and get folded into the durable store
//! and the bucket index; both views must agree afterwards.

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tasklite::cycle::{CycleRuleEngine, CycleType};
use tasklite::index::DataStore;
use tasklite::record::{FieldConfig, TaskRecord};
use tasklite::store::{QueryFilters, StoreConfig, StoreManager};
use tasklite::sync::{
    BroadcastBus, ChangeOp, MessageBus, SyncAbsorber, SyncEnvelope, SyncEvent,
};

fn record(id: u64, start: &str, result: &str) -> TaskRecord {
    match json!({
        "id": id,
        "plan_id": format!("PLAN-{}", id),
        "start_time": start,
        "task_result": result,
    }) {
        serde_json::Value::Object(map) => TaskRecord::new(map),
        _ => unreachable!(),
    }
}

async fn fixture() -> (StoreManager, Arc<RwLock<DataStore>>, SyncAbsorber) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = StoreManager::open(StoreConfig::in_memory())
        .await
        .expect("open store");
    store
        .store_all_data(
            vec![
                record(1, "2024-01-15 08:00:00", "正常"),
                record(2, "2024-02-20 09:00:00", "因设备故障失败"),
            ],
            None,
        )
        .await
        .expect("seed");

    let index = Arc::new(RwLock::new(DataStore::new(FieldConfig::default())));
    let engine = CycleRuleEngine::with_defaults();
    index.write().load_data(
        store
            .query_all_data(QueryFilters::default())
            .await
            .expect("scan"),
        &engine,
        CycleType::Day,
    );

    let absorber = SyncAbsorber::new(store.clone(), Arc::clone(&index), engine, CycleType::Day);
    (store, index, absorber)
}

#[tokio::test]
async fn insert_event_reaches_both_stores() {
    let (store, index, absorber) = fixture().await;

    let touched = absorber
        .absorb(&SyncEvent::DataChange {
            op: ChangeOp::Insert,
            record: record(3, "2024-01-16 10:00:00", "未跟踪"),
        })
        .await
        .expect("absorb");
    assert_eq!(touched, vec!["2024-01-16".to_string()]);

    assert_eq!(store.metadata().total_count, 3);
    assert_eq!(index.read().record_count(), 3);
    assert_eq!(index.read().bucket_of("3"), Some("2024-01-16"));
}

#[tokio::test]
async fn update_event_moves_record_consistently() {
    let (store, index, absorber) = fixture().await;

    // Record 1 moves from January to February, same quarter
    let touched = absorber
        .absorb(&SyncEvent::DataChange {
            op: ChangeOp::Update,
            record: record(1, "2024-02-21 08:00:00", "正常"),
        })
        .await
        .expect("absorb");
    assert_eq!(
        touched,
        vec!["2024-01-15".to_string(), "2024-02-21".to_string()]
    );

    assert_eq!(store.metadata().total_count, 2);
    let all = store
        .query_all_data(QueryFilters::default())
        .await
        .expect("scan");
    assert_eq!(all.len(), 2);
    assert_eq!(index.read().bucket_of("1"), Some("2024-02-21"));
    assert!(index.read().verify_index_consistency());
}

#[tokio::test]
async fn delete_event_removes_from_both_stores() {
    let (store, index, absorber) = fixture().await;

    let touched = absorber
        .absorb(&SyncEvent::DataChange {
            op: ChangeOp::Delete,
            record: record(2, "2024-02-20 09:00:00", "因设备故障失败"),
        })
        .await
        .expect("absorb");
    assert_eq!(touched, vec!["2024-02-20".to_string()]);

    assert_eq!(store.metadata().total_count, 1);
    assert_eq!(index.read().record_count(), 1);
    assert_eq!(index.read().bucket_of("2"), None);
}

#[tokio::test]
async fn batch_update_reports_touched_buckets_once() {
    let (_store, index, absorber) = fixture().await;

    let touched = absorber
        .absorb(&SyncEvent::BatchUpdate {
            records: vec![
                record(3, "2024-03-01 08:00:00", "正常"),
                record(4, "2024-03-01 09:00:00", "正常"),
                record(5, "2024-03-02 08:00:00", "正常"),
            ],
        })
        .await
        .expect("absorb");
    assert_eq!(
        touched,
        vec!["2024-03-01".to_string(), "2024-03-02".to_string()]
    );
    assert_eq!(index.read().record_count(), 5);
}

#[tokio::test]
async fn bus_delivered_events_are_absorbed() {
    let (store, index, absorber) = fixture().await;
    let bus = BroadcastBus::default();
    let mut rx = bus.subscribe();

    bus.publish(SyncEnvelope::new(SyncEvent::DataChange {
        op: ChangeOp::Insert,
        record: record(9, "2024-01-20 08:00:00", "正常"),
    }))
    .expect("publish");
    // Load notifications carry no change and must be ignored
    bus.publish(SyncEnvelope::new(SyncEvent::DataLoaded { count: 2 }))
        .expect("publish");

    for _ in 0..2 {
        let envelope = rx.recv().await.expect("recv");
        absorber.absorb(&envelope.event).await.expect("absorb");
    }

    assert_eq!(store.metadata().total_count, 3);
    assert_eq!(index.read().bucket_of("9"), Some("2024-01-20"));
}
