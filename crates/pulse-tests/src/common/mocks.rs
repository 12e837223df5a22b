// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Wiring
//!
//! Helpers assembling the pipeline over `pulse_store::MockStore`.

use std::sync::Arc;

use pulse_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use pulse_core::types::{MetricRecord, METRICS_KEY};
use pulse_monitor::buffer::{BufferConfig, MetricBuffer};
use pulse_monitor::service::MonitorService;
use pulse_store::mock::MockStore;

/// A fully wired pipeline over a mock store.
pub struct MockPipeline {
    /// The mock store, for failure scripting and state inspection.
    pub store: Arc<MockStore>,
    /// The shared breaker.
    pub breaker: Arc<CircuitBreaker>,
    /// The service facade.
    pub service: MonitorService<MockStore>,
}

impl MockPipeline {
    /// Wires a pipeline with the given configurations.
    pub fn new(buffer_config: BufferConfig, breaker_config: CircuitBreakerConfig) -> Self {
        let store = Arc::new(MockStore::new());
        let breaker = Arc::new(CircuitBreaker::new(breaker_config));
        let service = MonitorService::new(store.clone(), breaker.clone(), buffer_config);
        Self {
            store,
            breaker,
            service,
        }
    }

    /// Returns the records currently persisted under the snapshot key.
    pub fn persisted_records(&self) -> Vec<MetricRecord> {
        self.store
            .value(METRICS_KEY)
            .map(|bytes| serde_json::from_slice(&bytes).expect("snapshot should be valid JSON"))
            .unwrap_or_default()
    }

    /// Returns the persisted component names, in order.
    pub fn persisted_names(&self) -> Vec<String> {
        self.persisted_records()
            .into_iter()
            .map(|r| r.component_name)
            .collect()
    }
}

/// Builds a standalone buffer over a mock store, for buffer-only tests.
pub fn mock_buffer(config: BufferConfig) -> (Arc<MetricBuffer<MockStore>>, Arc<MockStore>) {
    let store = Arc::new(MockStore::new());
    let breaker = Arc::new(CircuitBreaker::new(crate::common::builders::fast_breaker_config()));
    let buffer = MetricBuffer::new(store.clone(), breaker, config);
    (buffer, store)
}
