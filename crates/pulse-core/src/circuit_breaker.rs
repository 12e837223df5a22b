// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Circuit breaker with lock-free state management.
//!
//! Every backing store call in Pulse goes through this breaker. It tracks
//! the failure rate over a rolling window, enforces a per-call timeout, and
//! fails fast while the dependency is down so callers can degrade to safe
//! defaults instead of piling up on a dead connection.
//!
//! # State Transitions
//!
//! ```text
//!                  failure rate over threshold
//!   ┌──────┐ ─────────────────────────────────▶ ┌──────┐
//!   │Closed│                                    │ Open │
//!   └──────┘ ◀──────────────┐                   └──┬───┘
//!      ▲                    │                      │ reset timeout
//!      │ trial succeeds  ┌──┴──────┐               │ elapsed
//!      └──────────────── │HalfOpen │ ◀─────────────┘
//!        trial fails ───▶└─────────┘ (one trial call allowed)
//! ```
//!
//! All state lives in a single atomic word (state + windowed counters), so
//! `status()` is a pure load and never mutates breaker state.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CircuitState, CircuitStatus};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Deadline applied to every call routed through the breaker.
    /// A timed-out call counts as a failure.
    #[serde(default = "default_call_timeout")]
    #[serde(with = "duration_millis")]
    pub call_timeout: Duration,

    /// Failure percentage over the rolling window that opens the circuit.
    #[serde(default = "default_error_threshold_percent")]
    pub error_threshold_percent: u8,

    /// Time to wait in the open state before allowing a trial call.
    #[serde(default = "default_reset_timeout")]
    #[serde(with = "duration_millis")]
    pub reset_timeout: Duration,

    /// Length of the rolling window over which the failure rate is computed.
    #[serde(default = "default_window")]
    #[serde(with = "duration_millis")]
    pub window: Duration,

    /// Minimum number of calls in the window before the rate is evaluated.
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: u32,
}

fn default_call_timeout() -> Duration {
    Duration::from_millis(3000)
}

fn default_error_threshold_percent() -> u8 {
    50
}

fn default_reset_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_window() -> Duration {
    Duration::from_millis(10_000)
}

fn default_minimum_calls() -> u32 {
    5
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            call_timeout: default_call_timeout(),
            error_threshold_percent: default_error_threshold_percent(),
            reset_timeout: default_reset_timeout(),
            window: default_window(),
            minimum_calls: default_minimum_calls(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration suited to tests: tiny window, fast reset.
    pub fn for_testing() -> Self {
        Self {
            call_timeout: Duration::from_millis(200),
            error_threshold_percent: 50,
            reset_timeout: Duration::from_millis(100),
            window: Duration::from_millis(5_000),
            minimum_calls: 2,
        }
    }
}

// =============================================================================
// Circuit Breaker Error
// =============================================================================

/// Error returned when the circuit breaker rejects or fails a call.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The circuit is open; the call was not forwarded.
    #[error("Circuit breaker is open")]
    Open,

    /// The call exceeded the per-call timeout.
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// The inner operation failed.
    #[error("Inner operation failed: {0}")]
    Inner(#[source] E),
}

impl<E> CircuitError<E> {
    /// Returns `true` if the call was rejected without being forwarded.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open)
    }

    /// Returns the inner error if present.
    pub fn inner(&self) -> Option<&E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// State Encoding
// =============================================================================

/// Encodes the circuit state into a u64.
///
/// Layout:
/// - Bits 0-7: State (0=Closed, 1=Open, 2=HalfOpen)
/// - Bits 8-27: Failure count in the current window (20 bits)
/// - Bits 28-47: Success count in the current window (20 bits)
/// - Bits 48-55: Half-open trial attempts (8 bits)
/// - Bits 56-63: Reserved
#[derive(Debug, Clone, Copy)]
struct EncodedState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_attempts: u8,
}

const COUNT_MASK: u64 = 0xF_FFFF;
const COUNT_MAX: u32 = 0xF_FFFF;

impl EncodedState {
    fn new(state: CircuitState) -> Self {
        Self {
            state,
            failure_count: 0,
            success_count: 0,
            half_open_attempts: 0,
        }
    }

    fn encode(&self) -> u64 {
        (self.state.as_u8() as u64)
            | ((self.failure_count.min(COUNT_MAX) as u64) << 8)
            | ((self.success_count.min(COUNT_MAX) as u64) << 28)
            | ((self.half_open_attempts as u64) << 48)
    }

    fn decode(value: u64) -> Self {
        Self {
            state: CircuitState::from((value & 0xFF) as u8),
            failure_count: ((value >> 8) & COUNT_MASK) as u32,
            success_count: ((value >> 28) & COUNT_MASK) as u32,
            half_open_attempts: ((value >> 48) & 0xFF) as u8,
        }
    }

    fn total_calls(&self) -> u32 {
        self.failure_count.saturating_add(self.success_count)
    }
}

// =============================================================================
// Circuit Breaker
// =============================================================================

/// A lock-free circuit breaker with a rolling failure-rate window.
///
/// Thread-safe without locks: all transitions are CAS loops on a single
/// encoded atomic word. Reusable for every backing-store call kind (reads,
/// writes, pings), which is why the fallback value is the caller's concern:
/// the breaker reports rejection, the caller supplies the degraded default.
pub struct CircuitBreaker {
    /// Encoded state (state + windowed counters + trial attempts).
    state: AtomicU64,

    /// Start of the current rolling window, epoch ms.
    window_start: AtomicU64,

    /// When the circuit last opened, epoch ms. Zero if never opened.
    opened_at: AtomicU64,

    /// Total calls answered by rejection because the circuit was open.
    fallback_count: AtomicU64,

    /// Configuration.
    config: CircuitBreakerConfig,
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU64::new(EncodedState::new(CircuitState::Closed).encode()),
            window_start: AtomicU64::new(now_ms()),
            opened_at: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            config,
        }
    }

    /// Creates a breaker with the default configuration.
    pub fn default_config() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Executes an operation through the circuit breaker.
    ///
    /// If the circuit is open, the operation is not executed and
    /// `CircuitError::Open` is returned immediately. Otherwise the operation
    /// runs under the configured per-call timeout; a timeout is recorded as
    /// a failure.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_state()?;

        match tokio::time::timeout(self.config.call_timeout, f()).await {
            Ok(Ok(result)) => {
                self.record_success();
                Ok(result)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
            Err(_) => {
                self.record_failure();
                Err(CircuitError::Timeout(self.config.call_timeout))
            }
        }
    }

    /// Returns a read-only snapshot of the breaker.
    ///
    /// Pure atomic loads; never mutates breaker state.
    pub fn status(&self) -> CircuitStatus {
        let decoded = EncodedState::decode(self.state.load(Ordering::SeqCst));
        CircuitStatus {
            state: decoded.state,
            failure_count: decoded.failure_count,
            fallback_count: self.fallback_count.load(Ordering::SeqCst),
        }
    }

    /// Returns the current circuit state.
    pub fn current_state(&self) -> CircuitState {
        EncodedState::decode(self.state.load(Ordering::SeqCst)).state
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Manually resets the breaker to closed and clears all counters.
    pub fn reset(&self) {
        self.state
            .store(EncodedState::new(CircuitState::Closed).encode(), Ordering::SeqCst);
        self.window_start.store(now_ms(), Ordering::SeqCst);
        self.opened_at.store(0, Ordering::SeqCst);
        self.fallback_count.store(0, Ordering::SeqCst);
        tracing::info!("Circuit breaker manually reset");
    }

    /// Checks if a call may proceed, transitioning open -> half-open when
    /// the reset timeout has elapsed.
    fn check_state<E>(&self) -> Result<(), CircuitError<E>> {
        let encoded = self.state.load(Ordering::SeqCst);
        let current = EncodedState::decode(encoded);

        match current.state {
            CircuitState::Closed => Ok(()),

            CircuitState::Open => {
                if self.reset_timeout_elapsed() {
                    self.transition_to_half_open();
                    // Re-check so the half-open trial accounting applies.
                    self.check_state()
                } else {
                    self.reject()
                }
            }

            CircuitState::HalfOpen => {
                // Exactly one trial call is allowed through.
                if current.half_open_attempts == 0 {
                    let mut next = current;
                    next.half_open_attempts = 1;
                    match self.state.compare_exchange(
                        encoded,
                        next.encode(),
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    ) {
                        Ok(_) => Ok(()),
                        Err(_) => self.check_state(),
                    }
                } else {
                    self.reject()
                }
            }
        }
    }

    fn reject<E>(&self) -> Result<(), CircuitError<E>> {
        self.fallback_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(state = %self.current_state(), "Circuit breaker rejected call");
        Err(CircuitError::Open)
    }

    fn reset_timeout_elapsed(&self) -> bool {
        let opened_at = self.opened_at.load(Ordering::SeqCst);
        if opened_at == 0 {
            return true;
        }
        now_ms().saturating_sub(opened_at) >= self.config.reset_timeout.as_millis() as u64
    }

    /// Restarts the rolling window if it has expired.
    ///
    /// Only meaningful while closed; the open/half-open states have their
    /// own timers.
    fn maybe_roll_window(&self) {
        let now = now_ms();
        let start = self.window_start.load(Ordering::SeqCst);
        if now.saturating_sub(start) < self.config.window.as_millis() as u64 {
            return;
        }
        if self
            .window_start
            .compare_exchange(start, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return; // Another caller rolled the window.
        }

        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);
            if current.state != CircuitState::Closed {
                return;
            }
            let mut next = current;
            next.failure_count = 0;
            next.success_count = 0;
            if self
                .state
                .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Records a successful call.
    fn record_success(&self) {
        self.maybe_roll_window();

        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            let next = match current.state {
                CircuitState::HalfOpen => {
                    // Trial succeeded, the dependency has recovered.
                    let next = EncodedState::new(CircuitState::Closed);
                    self.window_start.store(now_ms(), Ordering::SeqCst);
                    tracing::info!("Circuit breaker closed after successful trial");
                    next
                }
                _ => {
                    let mut next = current;
                    next.success_count = current.success_count.saturating_add(1);
                    next
                }
            };

            if self
                .state
                .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Records a failed call, opening the circuit when the windowed failure
    /// rate crosses the threshold.
    fn record_failure(&self) {
        self.maybe_roll_window();

        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            let mut next = current;
            next.failure_count = current.failure_count.saturating_add(1);

            let mut opened = false;
            match current.state {
                CircuitState::Closed => {
                    if self.should_open(&next) {
                        next.state = CircuitState::Open;
                        next.half_open_attempts = 0;
                        opened = true;
                    }
                }
                CircuitState::HalfOpen => {
                    // Trial failed, back to open and restart the reset timer.
                    next.state = CircuitState::Open;
                    next.half_open_attempts = 0;
                    opened = true;
                }
                CircuitState::Open => {}
            }

            if self
                .state
                .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if opened {
                    self.opened_at.store(now_ms(), Ordering::SeqCst);
                    tracing::warn!(
                        failures = next.failure_count,
                        total = next.total_calls(),
                        "Circuit breaker opened"
                    );
                }
                return;
            }
        }
    }

    fn should_open(&self, state: &EncodedState) -> bool {
        let total = state.total_calls();
        if total < self.config.minimum_calls {
            return false;
        }
        let failure_percent = (state.failure_count as u64 * 100) / total as u64;
        failure_percent >= self.config.error_threshold_percent as u64
    }

    fn transition_to_half_open(&self) {
        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            if current.state != CircuitState::Open {
                return; // Already transitioned.
            }

            let mut next = current;
            next.state = CircuitState::HalfOpen;
            next.half_open_attempts = 0;

            if self
                .state
                .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::info!("Circuit breaker entering half-open state");
                return;
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("CircuitBreaker")
            .field("state", &status.state)
            .field("failure_count", &status.failure_count)
            .field("fallback_count", &status.fallback_count)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
