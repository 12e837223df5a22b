// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `version` command.

/// Prints version information for all components.
pub fn execute() {
    println!("pulse {}", crate::VERSION);
    println!("  pulse-core    {}", pulse_core::VERSION);
    println!("  pulse-store   {}", pulse_store::VERSION);
    println!("  pulse-monitor {}", pulse_monitor::VERSION);
    println!("  pulse-config  {}", pulse_config::VERSION);
}
