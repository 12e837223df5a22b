// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the Pulse binary.

use thiserror::Error;

/// Result type alias for pulse-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the Pulse binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Shutdown drain error. Always fatal: there is no recovery path once
    /// shutdown has begun.
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Config parsing/validation error.
    #[error("Config error: {0}")]
    Config(#[from] pulse_core::error::ConfigError),

    /// Core pipeline error.
    #[error(transparent)]
    Core(#[from] pulse_core::error::PulseError),
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a shutdown error.
    pub fn shutdown(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(matches!(BinError::config("x"), BinError::Configuration(_)));
        assert!(matches!(BinError::init("x"), BinError::Initialization(_)));
        assert!(matches!(BinError::shutdown("x"), BinError::Shutdown(_)));
    }

    #[test]
    fn test_config_error_converts() {
        let err: BinError = pulse_core::error::ConfigError::validation("f", "bad").into();
        assert!(err.to_string().contains("Validation failed"));
    }
}
