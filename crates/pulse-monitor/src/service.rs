// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The monitor service facade.
//!
//! This is the surface the (out-of-scope) HTTP layer calls. Reads, health
//! checks, and clears degrade to safe defaults instead of propagating
//! errors, because the caller is a request handler that must always be able
//! to respond: an empty list, `false`, or a silent no-op tells the operator
//! more than a 500 would. The `/health` payload carries breaker state and
//! counters so "no metrics recorded" and "backing store down" remain
//! distinguishable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pulse_core::circuit_breaker::CircuitBreaker;
use pulse_core::error::BufferError;
use pulse_core::types::{CircuitStatus, MetricRecord, LAST_UPDATE_KEY, METRICS_KEY};
use pulse_store::traits::KeyValueStore;

use crate::buffer::{BufferConfig, BufferStats, MetricBuffer};
use crate::sampler::{ResourceSample, ResourceSampler, StoreHealth};

// =============================================================================
// Health Report
// =============================================================================

/// Merged health payload for the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Overall status string: `ok` or `degraded`.
    pub status: String,

    /// Circuit breaker snapshot.
    pub circuit: CircuitStatus,

    /// Buffer statistics.
    pub buffer: BufferStats,

    /// System resource sample (includes backing store health).
    pub resources: ResourceSample,
}

// =============================================================================
// Monitor Service
// =============================================================================

/// The metrics monitoring service.
///
/// Owns the buffer, the breaker, the store adapter handle, and the resource
/// sampler. Constructed once at the composition root and shared behind an
/// `Arc`; there is no hidden global instance.
pub struct MonitorService<S: KeyValueStore + 'static> {
    buffer: Arc<MetricBuffer<S>>,
    store: Arc<S>,
    breaker: Arc<CircuitBreaker>,
    sampler: ResourceSampler,
}

impl<S: KeyValueStore + 'static> MonitorService<S> {
    /// Creates a new service over the given store and breaker.
    pub fn new(store: Arc<S>, breaker: Arc<CircuitBreaker>, buffer_config: BufferConfig) -> Self {
        let buffer = MetricBuffer::new(store.clone(), breaker.clone(), buffer_config);
        Self {
            buffer,
            store,
            breaker,
            sampler: ResourceSampler::new(),
        }
    }

    /// Enqueues metric records for batched persistence.
    ///
    /// Never blocks on network I/O and never fails observably; under a
    /// sustained outage the buffer's pending cap bounds memory and data
    /// loss is possible by design. Records that fail basic validation
    /// (empty component name, negative render time) are discarded here so
    /// malformed input never reaches the buffer.
    pub fn save_metrics(&self, records: Vec<MetricRecord>) {
        let before = records.len();
        let valid: Vec<MetricRecord> = records.into_iter().filter(MetricRecord::is_valid).collect();
        let discarded = before - valid.len();
        if discarded > 0 {
            debug!(discarded, "Discarded invalid metric records");
        }
        self.buffer.append(valid);
    }

    /// Reads the most recently flushed metric batch.
    ///
    /// Returns an empty list on any failure, including an open breaker.
    pub async fn get_metrics(&self) -> Vec<MetricRecord> {
        let result = self.breaker.execute(|| self.store.get(METRICS_KEY)).await;

        match result {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Persisted snapshot is undecodable");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Metric read degraded to empty");
                Vec::new()
            }
        }
    }

    /// Deletes the snapshot and last-update keys.
    ///
    /// Failures are logged and swallowed.
    pub async fn clear_metrics(&self) {
        let result = self
            .breaker
            .execute(|| self.store.delete(&[METRICS_KEY, LAST_UPDATE_KEY]))
            .await;

        if let Err(e) = result {
            warn!(error = %e, "Failed to clear persisted metrics");
        }
    }

    /// Pings the backing store through the circuit breaker.
    ///
    /// Returns `false` on any failure, including an open breaker.
    pub async fn health_check(&self) -> bool {
        self.store_health().await.connected
    }

    /// Breaker-protected ping with latency, for the health payload.
    pub async fn store_health(&self) -> StoreHealth {
        match self.breaker.execute(|| self.store.ping()).await {
            Ok(latency) => StoreHealth::connected(latency),
            Err(_) => StoreHealth::disconnected(),
        }
    }

    /// Returns a read-only circuit breaker snapshot.
    pub fn circuit_status(&self) -> CircuitStatus {
        self.breaker.status()
    }

    /// Returns buffer statistics.
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Builds the merged health payload: breaker state, buffer stats, and a
    /// (cached) resource sample carrying backing store health.
    pub async fn health_report(&self) -> HealthReport {
        let store_health = self.store_health().await;
        let status = if store_health.connected { "ok" } else { "degraded" };
        let resources = self.sampler.sample(store_health);

        HealthReport {
            status: status.to_string(),
            circuit: self.circuit_status(),
            buffer: self.buffer_stats(),
            resources,
        }
    }

    /// Forces one flush of whatever is pending. Used by the shutdown drain.
    pub async fn flush_now(&self) -> Result<(), BufferError> {
        self.buffer.flush().await
    }

    /// Returns the buffer handle.
    pub fn buffer(&self) -> &Arc<MetricBuffer<S>> {
        &self.buffer
    }

    /// Returns the store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: KeyValueStore + 'static> std::fmt::Debug for MonitorService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("store", &self.store.name())
            .field("pending", &self.buffer.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
