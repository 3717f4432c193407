// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Event vocabulary shared by every sync transport

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::TaskRecord;

/// Kind of single-record change carried by a [`SyncEvent::DataChange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Transport-agnostic sync event.
///
/// The same vocabulary flows over the real-time channel and the cross-tab
/// broadcast channel; transports only differ in how envelopes move.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A full dataset finished loading somewhere
    DataLoaded { count: usize },
    /// One record changed
    DataChange { op: ChangeOp, record: TaskRecord },
    /// Many records changed at once
    BatchUpdate { records: Vec<TaskRecord> },
    /// A chunk of a progressive load landed
    ProgressiveLoad {
        percent: u8,
        done: usize,
        total: usize,
    },
    /// Ask any peer for its current dataset
    RequestData,
    /// Answer to a `RequestData`
    DataResponse { records: Vec<TaskRecord> },
}

/// Envelope wrapping an event with its identity and optional correlation.
///
/// `correlates` carries the id of the request an envelope answers;
/// request/response pairing on the bus matches on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub id: Uuid,
    pub correlates: Option<Uuid>,
    pub event: SyncEvent,
}

impl SyncEnvelope {
    pub fn new(event: SyncEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlates: None,
            event,
        }
    }

    /// Build a reply correlated to `request`.
    pub fn reply_to(request: &SyncEnvelope, event: SyncEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlates: Some(request.id),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_wire_shape_is_tagged() {
        let event = SyncEvent::DataChange {
            op: ChangeOp::Update,
            record: serde_json::from_value(json!({"id": "t1"})).unwrap(),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "data_change");
        assert_eq!(wire["data"]["op"], "update");
        assert_eq!(wire["data"]["record"]["id"], "t1");
    }

    #[test]
    fn reply_carries_request_id() {
        let request = SyncEnvelope::new(SyncEvent::RequestData);
        let reply = SyncEnvelope::reply_to(&request, SyncEvent::DataResponse { records: vec![] });
        assert_eq!(reply.correlates, Some(request.id));
        assert_ne!(reply.id, request.id);
    }
}
