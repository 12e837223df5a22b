// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Service Integration Tests
//!
//! End-to-end tests of the monitor service facade:
//!
//! - Degraded return values under outage (empty reads, false health)
//! - Circuit breaker threshold, fallback counting, and recovery
//! - Health report assembly
//! - Append persistence mode through the full facade

use std::time::Duration;

use pulse_core::types::CircuitState;
use pulse_tests::common::builders::{
    append_mode_config, fast_breaker_config, manual_flush_config, record_batch,
    MetricRecordBuilder,
};
use pulse_tests::common::init_test_logging;
use pulse_tests::common::mocks::MockPipeline;

// =============================================================================
// Read/Write Path Tests
// =============================================================================

#[tokio::test]
async fn test_service_save_flush_get_round_trip() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());

    pipeline.service.save_metrics(record_batch(3));
    pipeline.service.flush_now().await.unwrap();

    let metrics = pipeline.service.get_metrics().await;
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0].component_name, "Component0");
}

#[tokio::test]
async fn test_service_get_metrics_empty_before_any_flush() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());
    assert!(pipeline.service.get_metrics().await.is_empty());
}

#[tokio::test]
async fn test_service_append_mode_accumulates_across_flushes() {
    init_test_logging();

    let pipeline = MockPipeline::new(append_mode_config(), fast_breaker_config());

    pipeline
        .service
        .save_metrics(vec![MetricRecordBuilder::new().component("first").build()]);
    pipeline.service.flush_now().await.unwrap();

    pipeline
        .service
        .save_metrics(vec![MetricRecordBuilder::new().component("second").build()]);
    pipeline.service.flush_now().await.unwrap();

    assert_eq!(pipeline.persisted_names(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_service_clear_metrics_then_empty_read() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());

    pipeline.service.save_metrics(record_batch(2));
    pipeline.service.flush_now().await.unwrap();
    assert!(!pipeline.service.get_metrics().await.is_empty());

    pipeline.service.clear_metrics().await;
    assert!(pipeline.service.get_metrics().await.is_empty());
}

// =============================================================================
// Outage Tests
// =============================================================================

#[tokio::test]
async fn test_service_outage_degrades_reads_and_health() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());
    pipeline.store.set_should_fail(true);

    assert!(pipeline.service.get_metrics().await.is_empty());
    assert!(!pipeline.service.health_check().await);

    // Writes never fail observably; the batch waits in the buffer.
    pipeline.service.save_metrics(record_batch(2));
    assert!(pipeline.service.flush_now().await.is_err());
    assert_eq!(pipeline.service.buffer().len(), 2);
}

#[tokio::test]
async fn test_service_breaker_opens_and_counts_fallbacks() {
    init_test_logging();

    // Long reset timeout: the breaker must still be open for the rejection
    // assertions below, however slowly the test runs.
    let breaker_config = pulse_core::circuit_breaker::CircuitBreakerConfig {
        reset_timeout: Duration::from_secs(60),
        ..fast_breaker_config()
    };
    let pipeline = MockPipeline::new(manual_flush_config(), breaker_config);
    pipeline.store.set_should_fail(true);

    // minimum_calls 2, threshold 50%.
    let _ = pipeline.service.health_check().await;
    let _ = pipeline.service.health_check().await;

    let status = pipeline.service.circuit_status();
    assert_eq!(status.state, CircuitState::Open);

    // While open, calls are rejected without reaching the store.
    let pings_before = pipeline.store.ping_calls.load(std::sync::atomic::Ordering::Relaxed);
    let fallbacks_before = status.fallback_count;

    assert!(!pipeline.service.health_check().await);
    assert!(pipeline.service.get_metrics().await.is_empty());

    let pings_after = pipeline.store.ping_calls.load(std::sync::atomic::Ordering::Relaxed);
    assert_eq!(pings_before, pings_after);
    assert_eq!(
        pipeline.service.circuit_status().fallback_count,
        fallbacks_before + 2
    );
}

#[tokio::test]
async fn test_service_outage_and_recovery_scenario() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());

    // Outage: reads degrade, health is false, breaker opens.
    pipeline.store.set_should_fail(true);
    assert!(pipeline.service.get_metrics().await.is_empty());
    assert!(!pipeline.service.health_check().await);
    assert_eq!(pipeline.service.circuit_status().state, CircuitState::Open);

    // Store restored; after the reset timeout the trial call succeeds.
    pipeline.store.set_should_fail(false);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(pipeline.service.health_check().await);
    assert_eq!(pipeline.service.circuit_status().state, CircuitState::Closed);
}

#[tokio::test]
async fn test_service_buffered_records_survive_outage() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());

    pipeline.store.set_should_fail(true);
    pipeline.service.save_metrics(record_batch(5));
    let _ = pipeline.service.flush_now().await;
    assert_eq!(pipeline.service.buffer().len(), 5);

    pipeline.store.set_should_fail(false);
    tokio::time::sleep(Duration::from_millis(150)).await;

    pipeline.service.flush_now().await.unwrap();
    assert_eq!(pipeline.persisted_names().len(), 5);
    assert!(pipeline.service.buffer().is_empty());
}

// =============================================================================
// Health Report Tests
// =============================================================================

#[tokio::test]
async fn test_service_health_report_ok() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());

    let report = pipeline.service.health_report().await;
    assert_eq!(report.status, "ok");
    assert!(report.resources.backing_store.connected);
    assert!(report.resources.backing_store.latency_ms.is_some());
    assert_eq!(report.circuit.state, CircuitState::Closed);
}

#[tokio::test]
async fn test_service_health_report_distinguishes_outage_from_idle() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());
    pipeline.store.set_should_fail(true);

    let _ = pipeline.service.health_check().await;
    let _ = pipeline.service.health_check().await;

    let report = pipeline.service.health_report().await;
    assert_eq!(report.status, "degraded");
    assert_eq!(report.circuit.state, CircuitState::Open);
    // An operator can tell "store down" from "nothing recorded": the
    // breaker surfaces failures even though get_metrics returns [].
    assert!(report.circuit.failure_count > 0 || report.circuit.fallback_count > 0);
}

#[tokio::test]
async fn test_service_health_report_serializes_expected_layout() {
    init_test_logging();

    let pipeline = MockPipeline::new(manual_flush_config(), fast_breaker_config());
    pipeline.service.save_metrics(record_batch(1));

    let report = pipeline.service.health_report().await;
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["status"].is_string());
    assert!(json["circuit"]["state"].is_string());
    assert!(json["circuit"]["fallbackCount"].is_number());
    assert!(json["buffer"]["pending"].is_number());
    assert!(json["resources"]["memTotalBytes"].is_number());
    assert!(json["resources"]["backingStore"]["connected"].is_boolean());
}
