// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service runtime orchestration.
//!
//! The runtime is the composition root: it builds the store adapter, the
//! circuit breaker, and the monitor service as explicitly constructed,
//! dependency-injected instances (no hidden global state), then waits for
//! shutdown. On a termination signal it forces one final flush of whatever
//! remains buffered and releases the store connection; if the drain fails
//! the process exits non-zero rather than continue in an unknown state.

use std::sync::Arc;

use tracing::{error, info};

use pulse_config::PulseConfig;
use pulse_core::circuit_breaker::CircuitBreaker;
use pulse_monitor::service::MonitorService;
use pulse_store::redis::RedisStore;
use pulse_store::traits::KeyValueStore;

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// ServiceRuntime
// =============================================================================

/// The main service runtime.
pub struct ServiceRuntime {
    config: PulseConfig,
    shutdown: ShutdownCoordinator,
}

impl ServiceRuntime {
    /// Creates a new runtime.
    pub fn new(config: PulseConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Returns the shutdown coordinator (for embedding and tests).
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Runs the service until shutdown is signaled, then drains.
    pub async fn run(self) -> BinResult<()> {
        info!("Starting Pulse v{}", pulse_core::VERSION);

        let store = Arc::new(
            RedisStore::new(self.config.store.clone())
                .map_err(|e| BinError::init(format!("Failed to create store adapter: {}", e)))?,
        );
        let breaker = Arc::new(CircuitBreaker::new(self.config.breaker.clone()));
        let service = Arc::new(MonitorService::new(
            store.clone(),
            breaker,
            self.config.buffer.clone(),
        ));

        info!(
            store = store.name(),
            batch_size = self.config.buffer.batch_size,
            "Pulse is ready"
        );

        self.shutdown.wait_for_shutdown().await;

        info!("Shutdown initiated, draining metric buffer...");
        Self::drain(service.as_ref(), store.as_ref()).await
    }

    /// Final drain: one flush, then release the connection.
    ///
    /// Runs at most once per process; the coordinator's single-fire latch
    /// keeps a second termination signal from re-entering this path.
    async fn drain<S: KeyValueStore + 'static>(
        service: &MonitorService<S>,
        store: &S,
    ) -> BinResult<()> {
        let flush_result = service.flush_now().await;
        store.close().await;

        match flush_result {
            Ok(()) => {
                info!("Pulse shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Final flush failed during shutdown");
                Err(BinError::shutdown(e.to_string()))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
