// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pulse-store
//!
//! Backing store adapter for the Pulse metrics ingestion service.
//!
//! This crate owns the connection to the external key-value store (Redis,
//! in a single-node or cluster topology), including the reconnect/backoff
//! policy, and exposes the primitive operations the pipeline needs: get,
//! set-with-expiry, delete, ping, and pipelined batch execution.
//!
//! Connectivity transitions are reported through a side-channel event hook
//! for logging and health purposes; they are not part of the call contract.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod mock;
pub mod redis;
pub mod traits;

pub use self::backoff::ReconnectPolicy;
pub use self::mock::MockStore;
pub use self::redis::{RedisStore, StoreConfig, StoreTopology};
pub use self::traits::{
    ConnectionState, KeyValueStore, LoggingStoreEventHandler, StoreEvent, StoreEventHandler, WriteOp,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
