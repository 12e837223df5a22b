// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builders for constructing test objects with sensible defaults.

use std::time::Duration;

use pulse_core::circuit_breaker::CircuitBreakerConfig;
use pulse_core::types::MetricRecord;
use pulse_monitor::buffer::{BufferConfig, PersistMode};

// =============================================================================
// MetricRecord Builder
// =============================================================================

/// Builder for [`MetricRecord`] instances.
#[derive(Debug, Clone)]
pub struct MetricRecordBuilder {
    component_name: String,
    render_time_ms: f64,
    captured_at_epoch_ms: i64,
}

impl Default for MetricRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRecordBuilder {
    /// Creates a builder with defaults.
    pub fn new() -> Self {
        Self {
            component_name: "TestComponent".to_string(),
            render_time_ms: 10.0,
            captured_at_epoch_ms: 1_700_000_000_000,
        }
    }

    /// Sets the component name.
    pub fn component(mut self, name: impl Into<String>) -> Self {
        self.component_name = name.into();
        self
    }

    /// Sets the render time.
    pub fn render_time_ms(mut self, ms: f64) -> Self {
        self.render_time_ms = ms;
        self
    }

    /// Sets the capture timestamp.
    pub fn captured_at(mut self, epoch_ms: i64) -> Self {
        self.captured_at_epoch_ms = epoch_ms;
        self
    }

    /// Builds the record.
    pub fn build(self) -> MetricRecord {
        MetricRecord::new(self.component_name, self.render_time_ms, self.captured_at_epoch_ms)
    }
}

/// Creates a batch of sequentially named records.
pub fn record_batch(count: usize) -> Vec<MetricRecord> {
    (0..count)
        .map(|i| {
            MetricRecordBuilder::new()
                .component(format!("Component{}", i))
                .render_time_ms(i as f64)
                .captured_at(1_700_000_000_000 + i as i64)
                .build()
        })
        .collect()
}

// =============================================================================
// Config Builders
// =============================================================================

/// Buffer configuration with a large batch and a debounce too long to fire
/// during a test, so flushes only happen when a test asks for them.
pub fn manual_flush_config() -> BufferConfig {
    BufferConfig::builder()
        .batch_size(100)
        .flush_debounce(Duration::from_secs(60))
        .build()
}

/// Buffer configuration with a short debounce for timer-driven tests.
pub fn debounce_config(debounce: Duration) -> BufferConfig {
    BufferConfig::builder()
        .batch_size(1000)
        .flush_debounce(debounce)
        .build()
}

/// Append-mode variant of [`manual_flush_config`].
pub fn append_mode_config() -> BufferConfig {
    BufferConfig::builder()
        .batch_size(100)
        .flush_debounce(Duration::from_secs(60))
        .persist_mode(PersistMode::Append)
        .build()
}

/// Breaker configuration that opens after two failures and recovers fast.
pub fn fast_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        call_timeout: Duration::from_millis(200),
        error_threshold_percent: 50,
        reset_timeout: Duration::from_millis(100),
        window: Duration::from_secs(5),
        minimum_calls: 2,
    }
}
