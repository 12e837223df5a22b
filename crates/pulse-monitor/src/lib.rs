// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pulse-monitor
//!
//! The metrics ingestion pipeline: an in-memory buffer that batches
//! client-reported performance metrics and flushes them through a
//! circuit-breaker-protected backing store client, plus the service facade
//! the HTTP layer calls and a TTL-cached system resource sampler for health
//! reporting.
//!
//! ## Data flow
//!
//! ```text
//! caller ──▶ MetricBuffer::append ──▶ (size threshold | debounce timer)
//!                                          │
//!                                          ▼
//!                                   flush ──▶ CircuitBreaker::execute
//!                                          │         │
//!                        requeue on failure◀─────────┤
//!                                                    ▼
//!                                          KeyValueStore::exec_batch
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod sampler;
pub mod service;

pub use buffer::{BufferConfig, BufferStats, MetricBuffer, PersistMode};
pub use sampler::{ResourceSample, ResourceSampler, StoreHealth};
pub use service::{HealthReport, MonitorService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
