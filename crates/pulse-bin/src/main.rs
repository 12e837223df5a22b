// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pulse - client performance metrics ingestion service.
//!
//! Main binary entry point.

use clap::Parser;

fn main() {
    let cli = pulse_bin::cli::Cli::parse();

    if let Err(e) = pulse_bin::run(cli) {
        eprintln!("pulse: {}", e);
        std::process::exit(1);
    }
}
