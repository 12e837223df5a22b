// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pulse-config
//!
//! Configuration schema and loading for the Pulse metrics service.
//!
//! Configuration comes from up to two layers, later layers winning:
//!
//! 1. An optional TOML file
//! 2. `PULSE_*` environment variable overrides
//!
//! Every option has a documented default, so an empty environment yields a
//! working local configuration.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigLoader};
pub use schema::{LogConfig, LogFormat, PulseConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
