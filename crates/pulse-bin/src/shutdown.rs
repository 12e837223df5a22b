// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! Handles OS signals (SIGTERM, SIGINT, SIGQUIT on Unix; Ctrl+C on Windows)
//! and fans the shutdown notification out to subscribers. Initiation is a
//! single-fire latch: a duplicate termination signal is a no-op, so the
//! drain-and-close path can never be entered twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across components.
///
/// # Example
///
/// ```ignore
/// use pulse_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
/// let mut rx = coordinator.subscribe();
///
/// tokio::spawn(async move {
///     rx.recv().await.ok();
///     // drain and close
/// });
///
/// coordinator.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Initiates shutdown. Idempotent: only the first call notifies.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for a shutdown signal (OS signal or manual initiation).
    pub async fn wait_for_shutdown(&self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        let mut receiver = self.subscribe();

        tokio::select! {
            _ = wait_for_os_signal() => {}
            _ = receiver.recv() => {
                // Manually initiated elsewhere.
                return;
            }
        }

        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for an OS termination signal.
async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Failed to register SIGQUIT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    }

    #[cfg(windows)]
    {
        use tokio::signal::ctrl_c;

        ctrl_c().await.expect("Failed to register Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}

// =============================================================================
// ShutdownToken
// =============================================================================

/// A lightweight handle for tasks that poll for shutdown.
#[derive(Clone)]
pub struct ShutdownToken {
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Creates a token from a coordinator.
    pub fn from_coordinator(coordinator: &ShutdownCoordinator) -> Self {
        Self {
            shutdown_initiated: coordinator.shutdown_initiated.clone(),
        }
    }

    /// Returns `true` if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================
