// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for Pulse.
//!
//! This module provides the data types that flow through the ingestion
//! pipeline: the metric record reported by clients, the circuit breaker
//! state enumeration, and the persisted key layout on the backing store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Persisted Key Layout
// =============================================================================

/// Backing store key holding the most recently flushed metric batch.
pub const METRICS_KEY: &str = "performance:metrics";

/// Backing store key holding the epoch-ms timestamp of the last flush.
pub const LAST_UPDATE_KEY: &str = "performance:metrics:last_update";

// =============================================================================
// MetricRecord
// =============================================================================

/// A single client-reported render-performance measurement.
///
/// Records are immutable once created. Identity is positional: there is no
/// id field, so duplicate records are indistinguishable and both are kept.
///
/// Field names serialize in camelCase to match the persisted JSON layout
/// written by the reporting clients.
///
/// # Examples
///
/// ```
/// use pulse_core::types::MetricRecord;
///
/// let record = MetricRecord::new("Card", 12.5, 1_700_000_000_000);
/// assert_eq!(record.component_name, "Card");
/// assert!(record.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    /// Name of the UI component that was measured.
    pub component_name: String,

    /// Render duration in milliseconds. Never negative.
    pub render_time_ms: f64,

    /// Client-side capture timestamp, epoch milliseconds.
    pub captured_at_epoch_ms: i64,
}

impl MetricRecord {
    /// Creates a new metric record.
    pub fn new(component_name: impl Into<String>, render_time_ms: f64, captured_at_epoch_ms: i64) -> Self {
        Self {
            component_name: component_name.into(),
            render_time_ms,
            captured_at_epoch_ms,
        }
    }

    /// Creates a record captured now.
    pub fn captured_now(component_name: impl Into<String>, render_time_ms: f64) -> Self {
        Self::new(component_name, render_time_ms, Utc::now().timestamp_millis())
    }

    /// Returns `true` if the record satisfies the ingestion constraints:
    /// non-empty component name and a non-negative render time.
    pub fn is_valid(&self) -> bool {
        !self.component_name.is_empty() && self.render_time_ms >= 0.0 && self.render_time_ms.is_finite()
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}ms@{}",
            self.component_name, self.render_time_ms, self.captured_at_epoch_ms
        )
    }
}

// =============================================================================
// CircuitState
// =============================================================================

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failure threshold exceeded, calls are rejected immediately.
    Open,
    /// Testing whether the dependency has recovered.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state encoded as a `u8` for atomic packing.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "halfOpen",
        };
        write!(f, "{}", s)
    }
}

impl Default for CircuitState {
    fn default() -> Self {
        Self::Closed
    }
}

// =============================================================================
// CircuitStatus
// =============================================================================

/// Read-only snapshot of a circuit breaker, exposed for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStatus {
    /// Current state.
    pub state: CircuitState,

    /// Failure count within the current rolling window.
    pub failure_count: u32,

    /// Total calls answered by the fallback because the circuit was open.
    pub fallback_count: u64,
}

// =============================================================================
// Tests
// =============================================================================
