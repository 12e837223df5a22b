// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command implementations.

pub mod run;
pub mod validate;
pub mod version;

use pulse_config::{ConfigLoader, PulseConfig};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Dispatches the parsed CLI to its command.
pub async fn dispatch(cli: Cli) -> BinResult<()> {
    match cli.command() {
        Commands::Run => run::execute(&cli).await,
        Commands::Validate => validate::execute(&cli),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Loads configuration per the CLI: a TOML file when given, otherwise
/// defaults plus `PULSE_*` environment overrides. CLI logging flags win
/// over both.
pub fn load_config(cli: &Cli) -> BinResult<PulseConfig> {
    let loader = ConfigLoader::new();
    let mut config = match &cli.config {
        Some(path) => loader.load(path)?,
        None => loader.load_from_env()?,
    };

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log.format = format.into();
    }

    Ok(config)
}
