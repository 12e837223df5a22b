// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! System resource sampler with a short-lived cache.
//!
//! Health reporting wants CPU and memory figures, but not at the cost of an
//! OS-level reading on every request: samples are cached for a 5 second TTL
//! against wall-clock time. The sampler retains its `sysinfo::System`
//! instance across calls, so each refresh computes CPU usage from the delta
//! between the previous raw counters and the new ones.
//!
//! The first-ever sample has no previous counters to diff against and
//! reports whatever baseline a single refresh produces (CPU usage may read
//! zero). That cold-start behavior is expected, not an error.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::System;

// =============================================================================
// Sample Types
// =============================================================================

/// Backing store health as seen through the circuit breaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    /// Whether the last breaker-protected ping succeeded.
    pub connected: bool,

    /// Observed ping latency, when connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl StoreHealth {
    /// Health for a reachable store.
    pub fn connected(latency: Duration) -> Self {
        Self {
            connected: true,
            latency_ms: Some(latency.as_millis() as u64),
        }
    }

    /// Health for an unreachable store.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            latency_ms: None,
        }
    }
}

/// A point-in-time reading of system resource utilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    /// 1/5/15 minute load averages.
    pub cpu_load_averages: [f64; 3],

    /// Aggregate CPU usage percentage, derived from the delta between two
    /// consecutive raw counter readings.
    pub cpu_usage_percent: f64,

    /// Total physical memory in bytes.
    pub mem_total_bytes: u64,

    /// Free physical memory in bytes.
    pub mem_free_bytes: u64,

    /// Used memory percentage.
    pub mem_used_percent: f64,

    /// System uptime in seconds.
    pub uptime_seconds: u64,

    /// Backing store health, merged in by the caller.
    pub backing_store: StoreHealth,
}

// =============================================================================
// Resource Sampler
// =============================================================================

/// Default cache TTL.
pub const DEFAULT_SAMPLE_TTL: Duration = Duration::from_secs(5);

struct SamplerInner {
    system: System,
    cached: Option<(Instant, ResourceSample)>,
}

/// TTL-cached system resource sampler.
///
/// Thread-safe; the retained `System` instance (the previous raw counters)
/// lives behind a mutex.
pub struct ResourceSampler {
    inner: Mutex<SamplerInner>,
    ttl: Duration,
}

impl ResourceSampler {
    /// Creates a sampler with the default 5 s TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SAMPLE_TTL)
    }

    /// Creates a sampler with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(SamplerInner {
                system: System::new(),
                cached: None,
            }),
            ttl,
        }
    }

    /// Returns a resource sample.
    ///
    /// If the cached sample is younger than the TTL it is returned as-is
    /// (including its recorded store health). Otherwise a fresh OS-level
    /// reading is taken, the cache is refreshed, and the provided store
    /// health is merged in.
    pub fn sample(&self, backing_store: StoreHealth) -> ResourceSample {
        let mut inner = self.inner.lock();

        if let Some((taken_at, sample)) = &inner.cached {
            if taken_at.elapsed() < self.ttl {
                return sample.clone();
            }
        }

        let sample = Self::take_fresh(&mut inner.system, backing_store);
        inner.cached = Some((Instant::now(), sample.clone()));
        sample
    }

    /// Drops the cached sample so the next call takes a fresh reading.
    pub fn invalidate(&self) {
        self.inner.lock().cached = None;
    }

    fn take_fresh(system: &mut System, backing_store: StoreHealth) -> ResourceSample {
        system.refresh_cpu();
        system.refresh_memory();

        let load = System::load_average();
        let mem_total = system.total_memory();
        let mem_free = system.free_memory();
        let mem_used_percent = if mem_total > 0 {
            ((mem_total - mem_free) as f64 / mem_total as f64) * 100.0
        } else {
            0.0
        };

        ResourceSample {
            cpu_load_averages: [load.one, load.five, load.fifteen],
            cpu_usage_percent: system.global_cpu_info().cpu_usage() as f64,
            mem_total_bytes: mem_total,
            mem_free_bytes: mem_free,
            mem_used_percent,
            uptime_seconds: System::uptime(),
            backing_store,
        }
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSampler").field("ttl", &self.ttl).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_returns_sample() {
        let sampler = ResourceSampler::new();
        let sample = sampler.sample(StoreHealth::disconnected());

        assert!(sample.mem_total_bytes > 0);
        assert!(sample.mem_used_percent >= 0.0 && sample.mem_used_percent <= 100.0);
        assert!(!sample.backing_store.connected);
    }

    #[test]
    fn test_cache_hit_within_ttl() {
        let sampler = ResourceSampler::with_ttl(Duration::from_secs(60));

        let first = sampler.sample(StoreHealth::disconnected());
        // The cached sample wins, including its recorded store health.
        let second = sampler.sample(StoreHealth::connected(Duration::from_millis(2)));

        assert!(!second.backing_store.connected);
        assert_eq!(first.uptime_seconds, second.uptime_seconds);
    }

    #[test]
    fn test_cache_expiry_takes_fresh_reading() {
        let sampler = ResourceSampler::with_ttl(Duration::from_millis(10));

        let _ = sampler.sample(StoreHealth::disconnected());
        std::thread::sleep(Duration::from_millis(20));
        let refreshed = sampler.sample(StoreHealth::connected(Duration::from_millis(2)));

        assert!(refreshed.backing_store.connected);
        assert_eq!(refreshed.backing_store.latency_ms, Some(2));
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let sampler = ResourceSampler::with_ttl(Duration::from_secs(60));

        let _ = sampler.sample(StoreHealth::disconnected());
        sampler.invalidate();
        let refreshed = sampler.sample(StoreHealth::connected(Duration::from_millis(1)));

        assert!(refreshed.backing_store.connected);
    }

    #[test]
    fn test_store_health_constructors() {
        let up = StoreHealth::connected(Duration::from_millis(3));
        assert!(up.connected);
        assert_eq!(up.latency_ms, Some(3));

        let down = StoreHealth::disconnected();
        assert!(!down.connected);
        assert_eq!(down.latency_ms, None);
    }
}
