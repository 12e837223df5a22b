// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `run` command: start the service.

use crate::cli::Cli;
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::ServiceRuntime;

/// Loads configuration, initializes logging, and runs until shutdown.
pub async fn execute(cli: &Cli) -> BinResult<()> {
    let config = super::load_config(cli)?;
    init_logging(&config.log);

    ServiceRuntime::new(config).run().await
}
