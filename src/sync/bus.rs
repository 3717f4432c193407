// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory message bus with request/response correlation

use log::debug;
use std::time::Duration;
use tokio::sync::broadcast;

use super::events::{SyncEnvelope, SyncEvent};
use super::{SyncError, SyncResult};

/// Caller-side deadline for request/response pairs on the bus
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Typed publish/subscribe seam.
///
/// The core's absorption logic depends only on this trait, so it can be
/// exercised against [`BroadcastBus`] in tests while production wires in a
/// cross-tab or socket-backed transport.
pub trait MessageBus: Send + Sync {
    fn publish(&self, envelope: SyncEnvelope) -> SyncResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<SyncEnvelope>;
}

/// In-process bus over `tokio::sync::broadcast`.
pub struct BroadcastBus {
    tx: broadcast::Sender<SyncEnvelope>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MessageBus for BroadcastBus {
    fn publish(&self, envelope: SyncEnvelope) -> SyncResult<()> {
        // A bus with no subscribers is not an error; peers may come and go
        let _ = self.tx.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SyncEnvelope> {
        self.tx.subscribe()
    }
}

/// Publish `event` and await the first envelope correlated to it.
///
/// Settlement is single-shot: the first matching reply wins, anything that
/// arrives after the deadline is discarded by virtue of nobody listening.
pub async fn request(
    bus: &dyn MessageBus,
    event: SyncEvent,
    timeout: Duration,
) -> SyncResult<SyncEnvelope> {
    // Subscribe before publishing so the reply cannot race past us
    let mut rx = bus.subscribe();
    let envelope = SyncEnvelope::new(event);
    let request_id = envelope.id;
    bus.publish(envelope)?;

    let wait = async {
        loop {
            match rx.recv().await {
                Ok(reply) if reply.correlates == Some(request_id) => return Ok(reply),
                Ok(other) => {
                    debug!("Ignoring uncorrelated envelope {}", other.id);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Bus receiver lagged, skipped {} envelope(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SyncError::BusClosed),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::events::ChangeOp;
    use serde_json::json;

    #[tokio::test]
    async fn request_resolves_on_correlated_reply() {
        let bus = BroadcastBus::default();
        let mut responder = bus.subscribe();

        let responder_task = tokio::spawn({
            let tx = bus.tx.clone();
            async move {
                loop {
                    let envelope = responder.recv().await.unwrap();
                    if matches!(envelope.event, SyncEvent::RequestData) {
                        let reply = SyncEnvelope::reply_to(
                            &envelope,
                            SyncEvent::DataResponse { records: vec![] },
                        );
                        let _ = tx.send(reply);
                        break;
                    }
                }
            }
        });

        let reply = request(&bus, SyncEvent::RequestData, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(reply.event, SyncEvent::DataResponse { .. }));
        responder_task.await.unwrap();
    }

    #[tokio::test]
    async fn request_ignores_uncorrelated_traffic_until_timeout() {
        let bus = BroadcastBus::default();
        let noise = tokio::spawn({
            let tx = bus.tx.clone();
            async move {
                for _ in 0..3 {
                    let record = serde_json::from_value(json!({"id": "n"})).unwrap();
                    let _ = tx.send(SyncEnvelope::new(SyncEvent::DataChange {
                        op: ChangeOp::Insert,
                        record,
                    }));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        });

        let err = request(&bus, SyncEvent::RequestData, Duration::from_millis(80))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
        noise.await.unwrap();
    }
}
