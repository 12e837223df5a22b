// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! The schema composes the component configurations owned by the other
//! crates (store, buffer, breaker) with the service-level options (logging),
//! and validates the combination.

use serde::{Deserialize, Serialize};
use std::fmt;

use pulse_core::circuit_breaker::CircuitBreakerConfig;
use pulse_core::error::ConfigError;
use pulse_monitor::buffer::BufferConfig;
use pulse_store::redis::{StoreConfig, StoreTopology};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// PulseConfig
// =============================================================================

/// Top-level configuration for the Pulse service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Backing store connection settings.
    #[serde(default = "default_store")]
    pub store: StoreConfig,

    /// Metric buffer settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Circuit breaker settings.
    #[serde(default)]
    pub breaker: CircuitBreakerConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_store() -> StoreConfig {
    StoreConfig::single("127.0.0.1", 6379)
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            buffer: BufferConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl PulseConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        match &self.store.topology {
            StoreTopology::Single { host, port } => {
                if host.is_empty() {
                    return Err(ConfigError::validation("store.host", "must not be empty"));
                }
                if *port == 0 {
                    return Err(ConfigError::validation("store.port", "must be non-zero"));
                }
            }
            StoreTopology::Cluster { nodes } => {
                if nodes.is_empty() {
                    return Err(ConfigError::validation(
                        "store.nodes",
                        "cluster mode requires at least one seed node",
                    ));
                }
                for node in nodes {
                    if !node.contains(':') {
                        return Err(ConfigError::validation(
                            "store.nodes",
                            format!("'{}' is not a host:port entry", node),
                        ));
                    }
                }
            }
        }

        if self.buffer.batch_size == 0 {
            return Err(ConfigError::validation("buffer.batch_size", "must be non-zero"));
        }
        if self.buffer.max_pending < self.buffer.batch_size {
            return Err(ConfigError::validation(
                "buffer.max_pending",
                "must be at least batch_size",
            ));
        }
        if self.breaker.error_threshold_percent == 0 || self.breaker.error_threshold_percent > 100 {
            return Err(ConfigError::validation(
                "breaker.error_threshold_percent",
                "must be in 1..=100",
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Minimal compact output.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Compact => "compact",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::validation(
                "log.format",
                format!("unknown format '{}'", other),
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
