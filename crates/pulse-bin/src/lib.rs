// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # pulse-bin
//!
//! Binary entry point for the Pulse metrics service: CLI parsing, logging
//! initialization, runtime composition, and graceful shutdown coordination.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use error::{BinError, BinResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dispatches a parsed CLI on a fresh multi-threaded async runtime.
pub fn run(cli: cli::Cli) -> BinResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| BinError::init(format!("Failed to build async runtime: {}", e)))?;

    runtime.block_on(commands::dispatch(cli))
}
