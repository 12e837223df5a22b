// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! Loads an optional TOML file, then applies `PULSE_*` environment variable
//! overrides on top. Recognized variables:
//!
//! | Variable | Maps to |
//! |---|---|
//! | `PULSE_STORE_HOST` | store host (single topology) |
//! | `PULSE_STORE_PORT` | store port (single topology) |
//! | `PULSE_STORE_PASSWORD` | store password |
//! | `PULSE_STORE_TLS` | TLS enable flag |
//! | `PULSE_STORE_CLUSTER_NODES` | comma-separated seeds; switches to cluster topology |
//! | `PULSE_BUFFER_BATCH_SIZE` | per-batch size |
//! | `PULSE_BUFFER_FLUSH_DEBOUNCE_MS` | debounce delay |
//! | `PULSE_BUFFER_MAX_PENDING` | pending cap |
//! | `PULSE_BUFFER_PERSIST_MODE` | `overwrite` or `append` |
//! | `PULSE_BREAKER_TIMEOUT_MS` | per-call timeout |
//! | `PULSE_BREAKER_ERROR_THRESHOLD` | error threshold percent |
//! | `PULSE_BREAKER_RESET_TIMEOUT_MS` | reset timeout |
//! | `PULSE_LOG_LEVEL` | log level |
//! | `PULSE_LOG_FORMAT` | log format |

use std::path::Path;
use std::time::Duration;

use pulse_core::error::ConfigError;
use pulse_monitor::buffer::PersistMode;
use pulse_store::redis::{StoreConfig, StoreTopology};

use crate::schema::{ConfigResult, PulseConfig};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads and layers configuration sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    apply_env: bool,
}

impl ConfigLoader {
    /// Creates a loader with the default `PULSE` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: "PULSE".to_string(),
            apply_env: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment overrides.
    pub fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.apply_env = enabled;
        self
    }

    /// Loads configuration from a TOML file plus environment overrides.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<PulseConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: PulseConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::parse(path.display().to_string(), e.to_string()))?;

        if self.apply_env {
            self.apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds configuration from defaults plus environment overrides only.
    pub fn load_from_env(&self) -> ConfigResult<PulseConfig> {
        let mut config = PulseConfig::default();
        if self.apply_env {
            self.apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the given lookup. Factored out of the
    /// environment so tests do not mutate process-global state.
    pub fn apply_overrides<F>(&self, config: &mut PulseConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}_{}", self.env_prefix, suffix));

        // Store topology. Cluster seeds win over host/port.
        if let Some(nodes) = var("STORE_CLUSTER_NODES") {
            let nodes: Vec<String> = nodes
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            let previous = config.store.clone();
            config.store = StoreConfig::cluster(nodes);
            config.store.password = previous.password;
            config.store.tls = previous.tls;
            config.store.connect_timeout = previous.connect_timeout;
        } else {
            let host = var("STORE_HOST");
            let port = var("STORE_PORT")
                .map(|v| parse_number::<u16>("STORE_PORT", &self.env_prefix, &v))
                .transpose()?;
            if host.is_some() || port.is_some() {
                let (current_host, current_port) = match &config.store.topology {
                    StoreTopology::Single { host, port } => (host.clone(), *port),
                    StoreTopology::Cluster { .. } => ("127.0.0.1".to_string(), 6379),
                };
                config.store.topology = StoreTopology::Single {
                    host: host.unwrap_or(current_host),
                    port: port.unwrap_or(current_port),
                };
            }
        }

        if let Some(password) = var("STORE_PASSWORD") {
            config.store.password = Some(password);
        }
        if let Some(tls) = var("STORE_TLS") {
            config.store.tls = parse_bool("STORE_TLS", &self.env_prefix, &tls)?;
        }

        // Buffer.
        if let Some(v) = var("BUFFER_BATCH_SIZE") {
            config.buffer.batch_size = parse_number("BUFFER_BATCH_SIZE", &self.env_prefix, &v)?;
        }
        if let Some(v) = var("BUFFER_FLUSH_DEBOUNCE_MS") {
            let millis: u64 = parse_number("BUFFER_FLUSH_DEBOUNCE_MS", &self.env_prefix, &v)?;
            config.buffer.flush_debounce = Duration::from_millis(millis);
        }
        if let Some(v) = var("BUFFER_MAX_PENDING") {
            config.buffer.max_pending = parse_number("BUFFER_MAX_PENDING", &self.env_prefix, &v)?;
        }
        if let Some(v) = var("BUFFER_PERSIST_MODE") {
            config.buffer.persist_mode = match v.to_lowercase().as_str() {
                "overwrite" => PersistMode::Overwrite,
                "append" => PersistMode::Append,
                other => {
                    return Err(ConfigError::invalid_env(
                        format!("{}_BUFFER_PERSIST_MODE", self.env_prefix),
                        format!("unknown mode '{}'", other),
                    ))
                }
            };
        }

        // Circuit breaker.
        if let Some(v) = var("BREAKER_TIMEOUT_MS") {
            let millis: u64 = parse_number("BREAKER_TIMEOUT_MS", &self.env_prefix, &v)?;
            config.breaker.call_timeout = Duration::from_millis(millis);
        }
        if let Some(v) = var("BREAKER_ERROR_THRESHOLD") {
            config.breaker.error_threshold_percent =
                parse_number("BREAKER_ERROR_THRESHOLD", &self.env_prefix, &v)?;
        }
        if let Some(v) = var("BREAKER_RESET_TIMEOUT_MS") {
            let millis: u64 = parse_number("BREAKER_RESET_TIMEOUT_MS", &self.env_prefix, &v)?;
            config.breaker.reset_timeout = Duration::from_millis(millis);
        }

        // Logging.
        if let Some(level) = var("LOG_LEVEL") {
            config.log.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.log.format = format.parse()?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(suffix: &str, prefix: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        ConfigError::invalid_env(format!("{}_{}", prefix, suffix), e.to_string())
    })
}

fn parse_bool(suffix: &str, prefix: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_env(
            format!("{}_{}", prefix, suffix),
            format!("'{}' is not a boolean", other),
        )),
    }
}

/// Convenience: loads from a file with the default loader.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PulseConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================
