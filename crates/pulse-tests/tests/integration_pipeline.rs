// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Pipeline Integration Tests
//!
//! End-to-end tests of the buffer and flush scheduler against a mock store:
//!
//! - Size-threshold and debounce flush triggers
//! - FIFO ordering across failed flushes
//! - Overwrite and append persistence semantics
//! - Pending cap eviction

use std::sync::Arc;
use std::time::Duration;

use pulse_core::circuit_breaker::CircuitBreaker;
use pulse_core::types::{MetricRecord, LAST_UPDATE_KEY, METRICS_KEY};
use pulse_monitor::buffer::{BufferConfig, MetricBuffer};
use pulse_store::mock::MockStore;

use pulse_tests::common::builders::{fast_breaker_config, record_batch, MetricRecordBuilder};
use pulse_tests::common::init_test_logging;

// =============================================================================
// Helper Functions
// =============================================================================

fn wire(config: BufferConfig) -> (Arc<MetricBuffer<MockStore>>, Arc<MockStore>) {
    let store = Arc::new(MockStore::new());
    let breaker = Arc::new(CircuitBreaker::new(fast_breaker_config()));
    let buffer = MetricBuffer::new(store.clone(), breaker, config);
    (buffer, store)
}

fn persisted_names(store: &MockStore) -> Vec<String> {
    store
        .value(METRICS_KEY)
        .map(|bytes| {
            let records: Vec<MetricRecord> = serde_json::from_slice(&bytes).unwrap();
            records.into_iter().map(|r| r.component_name).collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Flush Trigger Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_batch_threshold_flushes_without_timer() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(10)
            .flush_debounce(Duration::from_secs(600))
            .build(),
    );

    // Cumulative appends reach the threshold within one tick.
    buffer.append(record_batch(4));
    buffer.append(record_batch(6));

    tokio::time::sleep(Duration::from_millis(100)).await;

    // The 10-minute debounce cannot have fired; this was size-triggered.
    assert_eq!(store.batch_count(), 1);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_pipeline_normal_path_single_record_debounce() {
    init_test_logging();

    // batch_size 100 mirrors the production default; only the debounce is
    // shortened to keep the test fast.
    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_millis(100))
            .build(),
    );

    buffer.append(vec![MetricRecordBuilder::new()
        .component("Card")
        .render_time_ms(12.0)
        .captured_at(1000)
        .build()]);

    // Nothing flushes before the window elapses.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(store.batch_count(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Exactly one flush, containing exactly that record.
    assert_eq!(store.batch_count(), 1);
    assert_eq!(persisted_names(&store), vec!["Card"]);
}

#[tokio::test]
async fn test_pipeline_second_append_does_not_double_flush() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_millis(80))
            .build(),
    );

    buffer.append(record_batch(2));
    tokio::time::sleep(Duration::from_millis(20)).await;
    buffer.append(record_batch(2));

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Both appends landed inside one debounce window: one flush, 4 records.
    assert_eq!(store.batch_count(), 1);
    assert_eq!(persisted_names(&store).len(), 4);
}

#[tokio::test]
async fn test_pipeline_empty_flush_touches_no_store() {
    init_test_logging();

    let (buffer, store) = wire(BufferConfig::for_testing());

    buffer.flush().await.unwrap();
    buffer.flush().await.unwrap();

    assert_eq!(store.batch_calls.load(std::sync::atomic::Ordering::Relaxed), 0);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_fifo_preserved_across_failure() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_secs(600))
            .build(),
    );

    let abc: Vec<MetricRecord> = ["A", "B", "C"]
        .iter()
        .map(|name| MetricRecordBuilder::new().component(*name).build())
        .collect();
    buffer.append(abc);

    store.set_should_fail(true);
    assert!(buffer.flush().await.is_err());

    // Appended after the failed attempt; must stay behind A, B, C.
    buffer.append(vec![MetricRecordBuilder::new().component("D").build()]);

    store.set_should_fail(false);
    buffer.flush().await.unwrap();

    assert_eq!(persisted_names(&store), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_pipeline_repeated_failures_keep_batch_eligible() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_secs(600))
            .build(),
    );

    buffer.append(record_batch(3));
    store.set_should_fail(true);

    // The breaker opens partway through; open-circuit rejections requeue the
    // batch exactly like direct store failures do.
    for _ in 0..3 {
        assert!(buffer.flush().await.is_err());
        assert_eq!(buffer.len(), 3);
    }

    store.set_should_fail(false);
    // Let the breaker's reset timeout elapse so the trial call goes through.
    tokio::time::sleep(Duration::from_millis(150)).await;
    buffer.flush().await.unwrap();
    assert!(buffer.is_empty());

    let stats = buffer.stats();
    assert_eq!(stats.flush_failures, 3);
    assert_eq!(stats.flush_successes, 1);
}

// =============================================================================
// Persistence Semantics Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_overwrite_keeps_latest_batch_only() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_secs(600))
            .build(),
    );

    buffer.append(vec![MetricRecordBuilder::new().component("X").build()]);
    buffer.flush().await.unwrap();
    assert_eq!(persisted_names(&store), vec!["X"]);

    buffer.append(vec![MetricRecordBuilder::new().component("Y").build()]);
    buffer.flush().await.unwrap();

    // Y replaced X; earlier flushed metrics are gone.
    assert_eq!(persisted_names(&store), vec!["Y"]);
}

#[tokio::test]
async fn test_pipeline_last_update_key_written_with_same_ttl() {
    init_test_logging();

    let ttl = Duration::from_secs(24 * 60 * 60);
    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_secs(600))
            .snapshot_ttl(ttl)
            .build(),
    );

    buffer.append(record_batch(1));
    buffer.flush().await.unwrap();

    let last_update = store.value(LAST_UPDATE_KEY).expect("last-update key written");
    let epoch_ms: i64 = String::from_utf8(last_update).unwrap().parse().unwrap();
    assert!(epoch_ms > 1_600_000_000_000);

    assert_eq!(store.ttl(METRICS_KEY), Some(ttl));
    assert_eq!(store.ttl(LAST_UPDATE_KEY), Some(ttl));
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_pending_cap_bounds_memory() {
    init_test_logging();

    let (buffer, _store) = wire(
        BufferConfig::builder()
            .batch_size(1000)
            .flush_debounce(Duration::from_secs(600))
            .max_pending(50)
            .build(),
    );

    for _ in 0..10 {
        buffer.append(record_batch(20));
    }

    assert_eq!(buffer.len(), 50);
    assert_eq!(buffer.stats().records_dropped, 150);
}

#[tokio::test]
async fn test_pipeline_drop_oldest_keeps_newest() {
    init_test_logging();

    let (buffer, store) = wire(
        BufferConfig::builder()
            .batch_size(100)
            .flush_debounce(Duration::from_secs(600))
            .max_pending(2)
            .build(),
    );

    buffer.append(vec![
        MetricRecordBuilder::new().component("old").build(),
        MetricRecordBuilder::new().component("mid").build(),
        MetricRecordBuilder::new().component("new").build(),
    ]);

    buffer.flush().await.unwrap();
    assert_eq!(persisted_names(&store), vec!["mid", "new"]);
}
