// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sync absorption layer
//!
//! The concrete transports (WebSocket, cross-tab broadcast, backend stats
//! service) live outside this crate; what lives here is the typed event
//! vocabulary, an in-memory message bus with request/response correlation,
//! and the absorber that folds incoming change events into both the durable
//! store and the in-memory bucket index consistently.

pub mod absorber;
pub mod bus;
pub mod events;
pub mod stats;

use thiserror::Error;

pub use absorber::{CatchUpOutcome, SyncAbsorber};
pub use bus::{BroadcastBus, MessageBus, DEFAULT_REQUEST_TIMEOUT};
pub use events::{ChangeOp, SyncEnvelope, SyncEvent};
pub use stats::{query_stats_with_timeout, StatsRequest, StatsResponse, StatsTransport};

/// Errors raised by the sync layer
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Message bus closed")]
    BusClosed,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Record(#[from] crate::record::RecordError),
}

pub type SyncResult<T> = Result<T, SyncError>;
