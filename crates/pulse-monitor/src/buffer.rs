// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Metric buffer and flush scheduler.
//!
//! Incoming records accumulate in a FIFO queue. A flush is triggered either
//! by the queue reaching `batch_size` or by a debounce timer that collapses
//! a trickle of appends into one deferred write. Flushes go through the
//! circuit breaker to the backing store; a failed batch is re-inserted at
//! the front of the queue so its records stay ahead of anything appended
//! after the failed attempt.
//!
//! # Locking
//!
//! Queue state lives behind a `parking_lot::Mutex` and is only held for
//! in-memory mutation. The network call happens after the lock is released;
//! failure re-insertion reacquires it. A separate async mutex serializes
//! flush executions so two triggers can never race on the same queue slice.
//!
//! `append` never suspends and never blocks on network I/O; flush work runs
//! on spawned tasks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pulse_core::circuit_breaker::CircuitBreaker;
use pulse_core::error::BufferError;
use pulse_core::types::{MetricRecord, LAST_UPDATE_KEY, METRICS_KEY};
use pulse_store::traits::{KeyValueStore, WriteOp};

// =============================================================================
// Configuration
// =============================================================================

/// Snapshot persistence mode.
///
/// `Overwrite` replaces the snapshot key on every flush, so only the most
/// recently flushed batch is ever retrievable. `Append` merges the new batch
/// onto the existing snapshot instead (read-modify-write; safe under the
/// pipeline's single-active-writer model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Each flush replaces the snapshot.
    Overwrite,
    /// Each flush extends the snapshot.
    Append,
}

impl Default for PersistMode {
    fn default() -> Self {
        Self::Overwrite
    }
}

/// Configuration for the metric buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum records per flushed batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Debounce delay before a below-threshold buffer is flushed.
    #[serde(default = "default_flush_debounce")]
    #[serde(with = "duration_millis")]
    pub flush_debounce: Duration,

    /// Hard cap on buffered records. Oldest records are dropped beyond it.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Time-to-live applied to the persisted snapshot and last-update keys.
    #[serde(default = "default_snapshot_ttl")]
    #[serde(with = "duration_secs")]
    pub snapshot_ttl: Duration,

    /// Snapshot persistence mode.
    #[serde(default)]
    pub persist_mode: PersistMode,
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_debounce() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_pending() -> usize {
    10_000
}

fn default_snapshot_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_debounce: default_flush_debounce(),
            max_pending: default_max_pending(),
            snapshot_ttl: default_snapshot_ttl(),
            persist_mode: PersistMode::default(),
        }
    }
}

impl BufferConfig {
    /// Creates a configuration builder.
    pub fn builder() -> BufferConfigBuilder {
        BufferConfigBuilder::default()
    }

    /// Creates a configuration suited to tests: small batch, short debounce.
    pub fn for_testing() -> Self {
        Self {
            batch_size: 5,
            flush_debounce: Duration::from_millis(50),
            max_pending: 100,
            snapshot_ttl: Duration::from_secs(3600),
            persist_mode: PersistMode::Overwrite,
        }
    }
}

/// Builder for [`BufferConfig`].
#[derive(Debug, Default)]
pub struct BufferConfigBuilder {
    config: BufferConfig,
}

impl BufferConfigBuilder {
    /// Sets the batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Sets the flush debounce delay.
    pub fn flush_debounce(mut self, debounce: Duration) -> Self {
        self.config.flush_debounce = debounce;
        self
    }

    /// Sets the pending cap.
    pub fn max_pending(mut self, max: usize) -> Self {
        self.config.max_pending = max;
        self
    }

    /// Sets the snapshot TTL.
    pub fn snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.config.snapshot_ttl = ttl;
        self
    }

    /// Sets the persistence mode.
    pub fn persist_mode(mut self, mode: PersistMode) -> Self {
        self.config.persist_mode = mode;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BufferConfig {
        self.config
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Lock-free buffer statistics.
#[derive(Debug, Default)]
struct StatsInner {
    records_appended: AtomicU64,
    records_flushed: AtomicU64,
    records_dropped: AtomicU64,
    flush_successes: AtomicU64,
    flush_failures: AtomicU64,
    pending: AtomicU64,
    last_flush_ms: AtomicI64,
}

impl StatsInner {
    fn snapshot(&self) -> BufferStats {
        let last_flush_ms = self.last_flush_ms.load(Ordering::Relaxed);
        BufferStats {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            flush_successes: self.flush_successes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            last_flush_epoch_ms: (last_flush_ms > 0).then_some(last_flush_ms),
        }
    }
}

/// Immutable snapshot of buffer statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    /// Records accepted by `append` (cumulative).
    pub records_appended: u64,
    /// Records successfully flushed (cumulative).
    pub records_flushed: u64,
    /// Records dropped by the pending cap (cumulative).
    pub records_dropped: u64,
    /// Successful flush executions.
    pub flush_successes: u64,
    /// Failed flush executions (batch re-queued).
    pub flush_failures: u64,
    /// Records currently buffered.
    pub pending: u64,
    /// Epoch ms of the last successful flush.
    pub last_flush_epoch_ms: Option<i64>,
}

// =============================================================================
// Metric Buffer
// =============================================================================

struct BufferState {
    pending: VecDeque<MetricRecord>,
    debounce: Option<JoinHandle<()>>,
}

/// The metric buffer and flush scheduler.
///
/// Thread-safe; share behind an `Arc`. Records are flushed in FIFO order
/// relative to `append` calls on the same buffer. No ordering guarantee
/// exists across process restarts (nothing is persisted locally).
pub struct MetricBuffer<S: KeyValueStore + 'static> {
    store: Arc<S>,
    breaker: Arc<CircuitBreaker>,
    config: BufferConfig,
    state: Mutex<BufferState>,
    flush_gate: tokio::sync::Mutex<()>,
    stats: StatsInner,
    /// Self-handle for spawning flush tasks from `append`.
    weak_self: Weak<Self>,
}

impl<S: KeyValueStore + 'static> MetricBuffer<S> {
    /// Creates a new buffer writing through the given breaker and store.
    pub fn new(store: Arc<S>, breaker: Arc<CircuitBreaker>, config: BufferConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            breaker,
            config,
            state: Mutex::new(BufferState {
                pending: VecDeque::new(),
                debounce: None,
            }),
            flush_gate: tokio::sync::Mutex::new(()),
            stats: StatsInner::default(),
            weak_self: weak_self.clone(),
        })
    }

    /// Appends records to the buffer tail and schedules a flush.
    ///
    /// If the queue reaches `batch_size`, an immediate flush is triggered
    /// and any pending debounce timer is cancelled. Otherwise, if no timer
    /// is currently scheduled, one is started at `flush_debounce`. The call
    /// returns as soon as the in-memory mutation is done.
    pub fn append(&self, records: Vec<MetricRecord>) {
        if records.is_empty() {
            return;
        }

        let flush_immediately = {
            let mut state = self.state.lock();

            self.stats
                .records_appended
                .fetch_add(records.len() as u64, Ordering::Relaxed);
            state.pending.extend(records);

            // Pending cap: drop oldest beyond it.
            let dropped = state.pending.len().saturating_sub(self.config.max_pending);
            if dropped > 0 {
                state.pending.drain(..dropped);
                self.stats
                    .records_dropped
                    .fetch_add(dropped as u64, Ordering::Relaxed);
                warn!(dropped, max_pending = self.config.max_pending, "Metric buffer full, dropped oldest records");
            }

            self.stats
                .pending
                .store(state.pending.len() as u64, Ordering::Relaxed);

            if state.pending.len() >= self.config.batch_size {
                // A size-triggered flush supersedes the debounce timer.
                if let Some(timer) = state.debounce.take() {
                    timer.abort();
                }
                true
            } else {
                if state.debounce.is_none() {
                    state.debounce = Some(self.spawn_debounce_timer());
                }
                false
            }
        };

        if flush_immediately {
            if let Some(buffer) = self.weak_self.upgrade() {
                tokio::spawn(async move {
                    let _ = buffer.flush().await;
                });
            }
        }
    }

    fn spawn_debounce_timer(&self) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            let debounce = match weak.upgrade() {
                Some(buffer) => buffer.config.flush_debounce,
                None => return,
            };
            tokio::time::sleep(debounce).await;
            if let Some(buffer) = weak.upgrade() {
                // Release the timer slot before flushing so a new trickle of
                // appends can schedule the next window while this flush runs.
                buffer.state.lock().debounce = None;
                let _ = buffer.flush().await;
            }
        })
    }

    /// Flushes up to `batch_size` records from the front of the queue.
    ///
    /// A no-op on an empty buffer. On failure the taken batch is re-inserted
    /// at the front, preserving its position ahead of records appended after
    /// the failed attempt; the error is reported to the caller but `append`
    /// callers never observe it.
    pub async fn flush(&self) -> Result<(), BufferError> {
        // Serializes flush executions; concurrent triggers queue up here
        // and each one re-examines the buffer under the state lock.
        let _gate = self.flush_gate.lock().await;

        let batch: Vec<MetricRecord> = {
            let mut state = self.state.lock();
            if let Some(timer) = state.debounce.take() {
                timer.abort();
            }
            if state.pending.is_empty() {
                return Ok(());
            }
            let take = state.pending.len().min(self.config.batch_size);
            let batch = state.pending.drain(..take).collect();
            self.stats
                .pending
                .store(state.pending.len() as u64, Ordering::Relaxed);
            batch
        };

        let count = batch.len();
        match self.write_batch(&batch).await {
            Ok(()) => {
                self.stats
                    .records_flushed
                    .fetch_add(count as u64, Ordering::Relaxed);
                self.stats.flush_successes.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .last_flush_ms
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
                debug!(records = count, "Flushed metric batch");
                Ok(())
            }
            Err(message) => {
                {
                    let mut state = self.state.lock();
                    for record in batch.into_iter().rev() {
                        state.pending.push_front(record);
                    }
                    self.stats
                        .pending
                        .store(state.pending.len() as u64, Ordering::Relaxed);
                }
                self.stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                warn!(records = count, error = %message, "Flush failed, batch re-queued");
                Err(BufferError::flush_failed(message))
            }
        }
    }

    /// Writes one batch through the circuit breaker.
    async fn write_batch(&self, batch: &[MetricRecord]) -> Result<(), String> {
        let payload: Vec<MetricRecord> = match self.config.persist_mode {
            PersistMode::Overwrite => batch.to_vec(),
            PersistMode::Append => {
                let mut existing = self.read_existing_snapshot().await?;
                existing.extend_from_slice(batch);
                existing
            }
        };

        let json = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;
        let ttl = self.config.snapshot_ttl;
        let ops = vec![
            WriteOp::set_with_expiry(METRICS_KEY, json, ttl),
            WriteOp::set_with_expiry(
                LAST_UPDATE_KEY,
                Utc::now().timestamp_millis().to_string().into_bytes(),
                ttl,
            ),
        ];

        self.breaker
            .execute(|| self.store.exec_batch(ops))
            .await
            .map_err(|e| e.to_string())
    }

    /// Reads the current snapshot for append-mode merging.
    ///
    /// A missing key is an empty snapshot; an undecodable one is treated as
    /// empty and overwritten. A store failure fails the flush so the batch
    /// is retried later.
    async fn read_existing_snapshot(&self) -> Result<Vec<MetricRecord>, String> {
        let bytes = self
            .breaker
            .execute(|| self.store.get(METRICS_KEY))
            .await
            .map_err(|e| e.to_string())?;

        match bytes {
            None => Ok(Vec::new()),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => Ok(records),
                Err(e) => {
                    warn!(error = %e, "Persisted snapshot is undecodable, replacing it");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Returns the number of buffered records (O(1)).
    pub fn len(&self) -> usize {
        self.stats.pending.load(Ordering::Relaxed) as usize
    }

    /// Returns `true` if nothing is buffered (O(1)).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

impl<S: KeyValueStore + 'static> std::fmt::Debug for MetricBuffer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBuffer")
            .field("pending", &self.len())
            .field("batch_size", &self.config.batch_size)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::circuit_breaker::CircuitBreakerConfig;
    use pulse_store::mock::MockStore;

    fn record(name: &str, ms: f64) -> MetricRecord {
        MetricRecord::new(name, ms, 1_000)
    }

    fn records(n: usize) -> Vec<MetricRecord> {
        (0..n).map(|i| record("Card", i as f64)).collect()
    }

    fn setup(config: BufferConfig) -> (Arc<MetricBuffer<MockStore>>, Arc<MockStore>) {
        let store = Arc::new(MockStore::new());
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::for_testing()));
        let buffer = MetricBuffer::new(store.clone(), breaker, config);
        (buffer, store)
    }

    fn persisted_records(store: &MockStore) -> Vec<MetricRecord> {
        store
            .value(METRICS_KEY)
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_batch_size_triggers_immediate_flush() {
        let (buffer, store) = setup(BufferConfig::builder().batch_size(3).flush_debounce(Duration::from_secs(60)).build());

        buffer.append(records(3));

        // The flush runs on a spawned task; give it a moment. The debounce
        // timer is 60 s, so this flush can only be size-triggered.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.batch_count(), 1);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_debounce_flushes_after_window() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_millis(40))
                .build(),
        );

        buffer.append(vec![record("Card", 12.0)]);
        buffer.append(vec![record("Card", 13.0)]); // within the window, no second timer

        assert_eq!(store.batch_count(), 0);

        tokio::time::sleep(Duration::from_millis(120)).await;

        // Both records went out in exactly one flush.
        assert_eq!(store.batch_count(), 1);
        assert_eq!(persisted_records(&store).len(), 2);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let (buffer, store) = setup(BufferConfig::for_testing());

        buffer.flush().await.unwrap();

        assert_eq!(store.batch_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_in_order() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_secs(60))
                .build(),
        );
        store.set_should_fail(true);

        buffer.append(vec![record("A", 1.0), record("B", 2.0), record("C", 3.0)]);
        assert!(buffer.flush().await.is_err());
        assert_eq!(buffer.len(), 3);

        // Records appended after the failed attempt stay behind the batch.
        buffer.append(vec![record("D", 4.0)]);

        store.set_should_fail(false);
        buffer.flush().await.unwrap();

        let names: Vec<String> = persisted_records(&store)
            .into_iter()
            .map(|r| r.component_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_overwrite_semantics() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_secs(60))
                .build(),
        );

        buffer.append(vec![record("X", 1.0)]);
        buffer.flush().await.unwrap();

        buffer.append(vec![record("Y", 2.0)]);
        buffer.flush().await.unwrap();

        let names: Vec<String> = persisted_records(&store)
            .into_iter()
            .map(|r| r.component_name)
            .collect();
        assert_eq!(names, vec!["Y"]);
    }

    #[tokio::test]
    async fn test_append_mode_extends_snapshot() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_secs(60))
                .persist_mode(PersistMode::Append)
                .build(),
        );

        buffer.append(vec![record("X", 1.0)]);
        buffer.flush().await.unwrap();

        buffer.append(vec![record("Y", 2.0)]);
        buffer.flush().await.unwrap();

        let names: Vec<String> = persisted_records(&store)
            .into_iter()
            .map(|r| r.component_name)
            .collect();
        assert_eq!(names, vec!["X", "Y"]);
    }

    #[tokio::test]
    async fn test_flush_writes_both_keys_with_ttl() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_secs(60))
                .snapshot_ttl(Duration::from_secs(1234))
                .build(),
        );

        buffer.append(vec![record("Card", 1.0)]);
        buffer.flush().await.unwrap();

        assert!(store.value(METRICS_KEY).is_some());
        let last_update = store.value(LAST_UPDATE_KEY).unwrap();
        let epoch_ms: i64 = String::from_utf8(last_update).unwrap().parse().unwrap();
        assert!(epoch_ms > 0);

        // Consistent TTL on both keys.
        assert_eq!(store.ttl(METRICS_KEY), Some(Duration::from_secs(1234)));
        assert_eq!(store.ttl(LAST_UPDATE_KEY), Some(Duration::from_secs(1234)));
    }

    #[tokio::test]
    async fn test_pending_cap_drops_oldest() {
        let (buffer, _store) = setup(
            BufferConfig::builder()
                .batch_size(1000)
                .flush_debounce(Duration::from_secs(60))
                .max_pending(10)
                .build(),
        );

        buffer.append(records(25));

        assert_eq!(buffer.len(), 10);
        let stats = buffer.stats();
        assert_eq!(stats.records_dropped, 15);
        assert_eq!(stats.records_appended, 25);
    }

    #[tokio::test]
    async fn test_batch_larger_than_batch_size_flushes_in_slices() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(4)
                .flush_debounce(Duration::from_secs(60))
                .build(),
        );

        buffer.append(records(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The size trigger flushed one slice of 4; the rest waits for the
        // next trigger.
        assert!(store.batch_count() >= 1);
        buffer.flush().await.unwrap();
        buffer.flush().await.unwrap();
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_stats_track_flushes() {
        let (buffer, store) = setup(
            BufferConfig::builder()
                .batch_size(100)
                .flush_debounce(Duration::from_secs(60))
                .build(),
        );

        buffer.append(records(3));
        buffer.flush().await.unwrap();

        store.set_should_fail(true);
        buffer.append(records(1));
        let _ = buffer.flush().await;

        let stats = buffer.stats();
        assert_eq!(stats.flush_successes, 1);
        assert_eq!(stats.flush_failures, 1);
        assert_eq!(stats.records_flushed, 3);
        assert!(stats.last_flush_epoch_ms.is_some());
    }
}
