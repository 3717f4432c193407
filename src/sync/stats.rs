// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend statistics channel contract
//!
//! The statistics engine itself is out of scope; the core only defines the
//! request/response shapes and a deadline wrapper so a slow backend can
//! never wedge a caller. Late resolutions are simply dropped.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cycle::CycleType;
use crate::index::BucketStats;

use super::{SyncError, SyncResult};

/// Default deadline for a statistics query
pub const DEFAULT_STATS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRequest {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub cycle: CycleType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Vec<BucketStats>,
}

/// Remote statistics service seam.
#[async_trait]
pub trait StatsTransport: Send + Sync {
    async fn query_stats(&self, request: StatsRequest) -> SyncResult<StatsResponse>;
}

/// Run a stats query with a hard deadline.
pub async fn query_stats_with_timeout(
    transport: &dyn StatsTransport,
    request: StatsRequest,
    timeout: Duration,
) -> SyncResult<StatsResponse> {
    match tokio::time::timeout(timeout, transport.query_stats(request)).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowTransport;

    #[async_trait]
    impl StatsTransport for SlowTransport {
        async fn query_stats(&self, _request: StatsRequest) -> SyncResult<StatsResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(StatsResponse { stats: vec![] })
        }
    }

    #[tokio::test]
    async fn slow_transport_hits_deadline() {
        let request = StatsRequest {
            start: None,
            end: None,
            cycle: CycleType::Quarter,
        };
        let err = query_stats_with_timeout(&SlowTransport, request, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
    }
}
