// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pulse-core
//!
//! Core abstractions and shared types for the Pulse metrics ingestion service.
//!
//! This crate provides the foundational pieces used across all Pulse
//! components:
//!
//! - **Types**: `MetricRecord`, `CircuitState`, persisted key layout
//! - **Error**: Unified error hierarchy
//! - **CircuitBreaker**: Fault isolation with lock-free state management
//!
//! ## Example
//!
//! ```rust,ignore
//! use pulse_core::types::MetricRecord;
//! use pulse_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let record = MetricRecord::new("Card", 12.5, 1_700_000_000_000);
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod circuit_breaker;
pub mod error;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
pub use error::{BufferError, ConfigError, PulseError, StoreError};
pub use types::{CircuitState, CircuitStatus, MetricRecord};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
