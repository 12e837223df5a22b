// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! Supported subcommands:
//!
//! - `run`: Start the service (default)
//! - `validate`: Validate a configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Pulse - client performance metrics ingestion service.
///
/// Buffers client-reported render metrics in memory and flushes them in
/// batches to a key-value backing store behind a circuit breaker.
#[derive(Parser, Debug)]
#[command(
    name = "pulse",
    author = "Sylvex <contact@sylvex.io>",
    version = pulse_core::VERSION,
    about = "Client performance metrics ingestion service",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path. Without it, defaults plus PULSE_* overrides apply.
    #[arg(short, long, env = "PULSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format override
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Returns the command to run, defaulting to `run`.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the service
    ///
    /// This is the default command when no subcommand is specified.
    Run,

    /// Validate the configuration
    ///
    /// Loads and validates the configuration (file plus environment
    /// overrides) without starting the service.
    Validate,

    /// Show detailed version information
    Version,
}

// =============================================================================
// Log Format
// =============================================================================

/// Log output format, as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for log aggregation.
    Json,
    /// Minimal compact output.
    Compact,
}

impl From<LogFormat> for pulse_config::LogFormat {
    fn from(value: LogFormat) -> Self {
        match value {
            LogFormat::Text => pulse_config::LogFormat::Text,
            LogFormat::Json => pulse_config::LogFormat::Json,
            LogFormat::Compact => pulse_config::LogFormat::Compact,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
