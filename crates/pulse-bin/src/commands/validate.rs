// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `validate` command: check configuration without starting.

use pulse_store::redis::StoreTopology;

use crate::cli::Cli;
use crate::error::BinResult;

/// Loads and validates the configuration, printing a short summary.
pub fn execute(cli: &Cli) -> BinResult<()> {
    let config = super::load_config(cli)?;

    let topology = match &config.store.topology {
        StoreTopology::Single { host, port } => format!("single ({}:{})", host, port),
        StoreTopology::Cluster { nodes } => format!("cluster ({} seeds)", nodes.len()),
    };

    println!("Configuration OK");
    println!("  store:      {}{}", topology, if config.store.tls { " +tls" } else { "" });
    println!("  batch size: {}", config.buffer.batch_size);
    println!("  debounce:   {:?}", config.buffer.flush_debounce);
    println!("  breaker:    {}% over {:?}, reset {:?}",
        config.breaker.error_threshold_percent,
        config.breaker.window,
        config.breaker.reset_timeout,
    );

    Ok(())
}
