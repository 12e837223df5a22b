// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for Pulse.
//!
//! This module defines the error types used across the ingestion pipeline:
//!
//! - Clear, descriptive error messages
//! - Error chaining for traceability
//! - A retryable/non-retryable distinction the circuit breaker and
//!   reconnect scheduler rely on
//!
//! # Error Hierarchy
//!
//! ```text
//! PulseError (root)
//! ├── ConfigError  - Configuration parsing and validation
//! ├── StoreError   - Backing store operations
//! └── BufferError  - Metric buffer operations
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// PulseError - Root Error Type
// =============================================================================

/// The root error type for Pulse.
///
/// All errors in the pipeline can be converted to this type, providing a
/// unified error handling interface at the composition root.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backing store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Buffer error.
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

impl PulseError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PulseError::Store(e) => e.is_retryable(),
            PulseError::Buffer(e) => e.is_retryable(),
            PulseError::Config(_) => false,
        }
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            PulseError::Config(_) => "config",
            PulseError::Store(_) => "store",
            PulseError::Buffer(_) => "buffer",
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: String,
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value for environment variable '{variable}': {message}")]
    InvalidEnv {
        /// The environment variable name.
        variable: String,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-environment-variable error.
    pub fn invalid_env(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnv {
            variable: variable.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// StoreError
// =============================================================================

/// Backing store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable or the connection was lost.
    #[error("Connection failed: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// A reconnect attempt is scheduled and has not yet come due.
    #[error("Reconnect pending, next attempt in {delay:?} (attempt {attempt})")]
    ReconnectPending {
        /// Delay until the next attempt is allowed.
        delay: Duration,
        /// The upcoming attempt number.
        attempt: u32,
    },

    /// A command was rejected or failed on the store side.
    #[error("Command failed: {message}")]
    Command {
        /// Error message.
        message: String,
    },

    /// A call exceeded its deadline.
    #[error("Operation timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The persisted payload could not be decoded.
    #[error("Failed to decode persisted value: {message}")]
    Decode {
        /// Error message.
        message: String,
    },
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Decode failures are permanent: retrying the same payload cannot
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Decode { .. })
    }
}

// =============================================================================
// BufferError
// =============================================================================

/// Metric buffer errors.
#[derive(Debug, Error)]
pub enum BufferError {
    /// A flush attempt failed and the batch was re-queued.
    #[error("Flush failed: {message}")]
    FlushFailed {
        /// Error message.
        message: String,
    },

    /// The final drain during shutdown failed.
    #[error("Shutdown drain failed: {message}")]
    DrainFailed {
        /// Error message.
        message: String,
    },
}

impl BufferError {
    /// Creates a flush failure.
    pub fn flush_failed(message: impl Into<String>) -> Self {
        Self::FlushFailed {
            message: message.into(),
        }
    }

    /// Creates a drain failure.
    pub fn drain_failed(message: impl Into<String>) -> Self {
        Self::DrainFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BufferError::FlushFailed { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(StoreError::connection("down").is_retryable());
        assert!(StoreError::command("READONLY").is_retryable());
        assert!(!StoreError::decode("bad json").is_retryable());

        assert!(BufferError::flush_failed("store down").is_retryable());
        assert!(!BufferError::drain_failed("store down").is_retryable());
    }

    #[test]
    fn test_root_conversion() {
        let err: PulseError = StoreError::connection("down").into();
        assert!(err.is_retryable());
        assert_eq!(err.error_type(), "store");

        let err: PulseError = ConfigError::validation("store.port", "must be non-zero").into();
        assert!(!err.is_retryable());
        assert_eq!(err.error_type(), "config");
    }

    #[test]
    fn test_messages() {
        let err = StoreError::Timeout {
            timeout: Duration::from_secs(3),
        };
        assert!(err.to_string().contains("3s"));

        let err = ConfigError::invalid_env("PULSE_STORE_PORT", "not a number");
        assert!(err.to_string().contains("PULSE_STORE_PORT"));
    }
}
