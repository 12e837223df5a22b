// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory mock implementation of [`KeyValueStore`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use pulse_core::error::StoreError;

use crate::traits::{KeyValueStore, WriteOp};

/// A mock backing store.
///
/// Supports scripted failures (`set_should_fail`), records every executed
/// batch for ordering assertions, and keeps written values in memory so
/// tests can verify overwrite semantics end-to-end.
#[derive(Debug, Default)]
pub struct MockStore {
    /// Key space. TTLs are recorded, not enforced.
    data: Mutex<HashMap<String, (Vec<u8>, Option<Duration>)>>,

    /// Every batch passed to `exec_batch`, in call order.
    batches: Mutex<Vec<Vec<WriteOp>>>,

    /// Whether calls should fail.
    should_fail: AtomicBool,

    /// Number of `get` calls.
    pub get_calls: AtomicU64,

    /// Number of `ping` calls.
    pub ping_calls: AtomicU64,

    /// Number of `exec_batch` calls (including failed ones).
    pub batch_calls: AtomicU64,

    /// Number of `delete` calls.
    pub delete_calls: AtomicU64,
}

impl MockStore {
    /// Creates a mock that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that fails every call.
    pub fn failing() -> Self {
        let store = Self::default();
        store.should_fail.store(true, Ordering::Relaxed);
        store
    }

    /// Sets whether calls should fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Returns the stored value for a key.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(key).map(|(v, _)| v.clone())
    }

    /// Returns the recorded TTL for a key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.data.lock().get(key).and_then(|(_, ttl)| *ttl)
    }

    /// Returns every batch executed so far.
    pub fn batches(&self) -> Vec<Vec<WriteOp>> {
        self.batches.lock().clone()
    }

    /// Returns the number of successful batch executions.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail.load(Ordering::Relaxed) {
            Err(StoreError::connection("mock store failure"))
        } else {
            Ok(())
        }
    }

    fn apply(&self, op: &WriteOp) {
        let mut data = self.data.lock();
        match op {
            WriteOp::SetWithExpiry { key, value, ttl } => {
                data.insert(key.clone(), (value.clone(), Some(*ttl)));
            }
            WriteOp::Delete { key } => {
                data.remove(key);
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.value(key))
    }

    async fn set_with_expiry(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.apply(&WriteOp::set_with_expiry(key, value, ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        self.ping_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(Duration::from_millis(1))
    }

    async fn exec_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        for op in &ops {
            self.apply(op);
        }
        self.batches.lock().push(ops);
        Ok(())
    }

    async fn close(&self) {}

    fn is_connected(&self) -> bool {
        !self.should_fail.load(Ordering::Relaxed)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_applies_and_records() {
        let store = MockStore::new();

        store
            .exec_batch(vec![
                WriteOp::set_with_expiry("k", b"v".to_vec(), Duration::from_secs(60)),
                WriteOp::delete("other"),
            ])
            .await
            .unwrap();

        assert_eq!(store.value("k"), Some(b"v".to_vec()));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(60)));
        assert_eq!(store.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let store = MockStore::failing();

        assert!(store.ping().await.is_err());
        assert!(store.get("k").await.is_err());
        assert_eq!(store.batch_count(), 0);

        store.set_should_fail(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_keys() {
        let store = MockStore::new();
        store
            .set_with_expiry("a", b"1".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();

        store.delete(&["a", "missing"]).await.unwrap();
        assert_eq!(store.value("a"), None);
    }
}
