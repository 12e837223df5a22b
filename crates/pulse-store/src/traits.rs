// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backing store traits and interfaces.
//!
//! This module defines the abstraction the rest of the pipeline programs
//! against. The real implementation is [`RedisStore`](crate::redis::RedisStore);
//! tests use [`MockStore`](crate::mock::MockStore).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use pulse_core::error::StoreError;

// =============================================================================
// Write Operations
// =============================================================================

/// A single write operation for pipelined batch execution.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set a key to a value with an expiry.
    SetWithExpiry {
        /// The key to write.
        key: String,
        /// The value bytes.
        value: Vec<u8>,
        /// Time-to-live applied to the key.
        ttl: Duration,
    },

    /// Delete a key.
    Delete {
        /// The key to delete.
        key: String,
    },
}

impl WriteOp {
    /// Creates a set-with-expiry operation.
    pub fn set_with_expiry(key: impl Into<String>, value: Vec<u8>, ttl: Duration) -> Self {
        Self::SetWithExpiry {
            key: key.into(),
            value,
            ttl,
        }
    }

    /// Creates a delete operation.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Returns the key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Self::SetWithExpiry { key, .. } => key,
            Self::Delete { key } => key,
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a store adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection has been established yet.
    Disconnected,
    /// Connected and ready.
    Connected,
    /// A connection was lost; reconnect attempts are scheduled.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if the adapter is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Encodes the state for atomic storage.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connected => 1,
            Self::Reconnecting => 2,
        }
    }
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            2 => Self::Reconnecting,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        write!(f, "{}", s)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

// =============================================================================
// Connectivity Events
// =============================================================================

/// A connectivity transition emitted by a store adapter.
///
/// Events are side-channel: they exist for logging and health reporting and
/// carry no delivery guarantee relative to the synchronous call contract.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A connection was established.
    Connected,
    /// A connection attempt or an in-flight call failed.
    Error(String),
}

/// Trait for observing store connectivity transitions.
pub trait StoreEventHandler: Send + Sync {
    /// Called when the adapter's connectivity changes.
    fn on_event(&self, event: &StoreEvent);
}

/// Event handler that logs transitions through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingStoreEventHandler;

impl StoreEventHandler for LoggingStoreEventHandler {
    fn on_event(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Connected => {
                tracing::info!("Backing store connected");
            }
            StoreEvent::Error(message) => {
                tracing::warn!(error = %message, "Backing store error");
            }
        }
    }
}

// =============================================================================
// KeyValueStore Trait
// =============================================================================

/// The primitive operations the ingestion pipeline needs from the backing
/// store.
///
/// # Implementation Requirements
///
/// - Implementations must be thread-safe (`Send + Sync`); the adapter is a
///   single shared resource per instance and only the adapter mutates
///   connection state.
/// - `exec_batch` must execute all operations in one network round trip
///   (pipelined) and fail as a unit.
/// - `is_connected` must not perform I/O.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a key. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a key with a time-to-live.
    async fn set_with_expiry(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes the given keys. Missing keys are not an error.
    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Round-trips a ping and returns the observed latency.
    async fn ping(&self) -> Result<Duration, StoreError>;

    /// Executes a batch of write operations in a single pipelined call.
    async fn exec_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Releases the connection. Subsequent calls behave as if never connected.
    async fn close(&self);

    /// Returns `true` if the adapter currently holds a live connection.
    fn is_connected(&self) -> bool;

    /// Returns the adapter name for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// Tests
// =============================================================================
