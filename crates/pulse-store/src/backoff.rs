// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reconnect delay policy.
//!
//! Connection failures map the attempt count to a delay of
//! `min(attempt * per_attempt, cap)`: linear growth with a hard ceiling.
//! Deliberately simple and unjittered; the circuit breaker upstream already
//! prevents a herd of callers from hammering a down store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Linear-then-capped reconnect delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay added per attempt.
    #[serde(with = "duration_millis")]
    pub per_attempt: Duration,

    /// Ceiling on the computed delay.
    #[serde(with = "duration_millis")]
    pub cap: Duration,
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

impl ReconnectPolicy {
    /// Creates a policy from raw delays.
    pub fn new(per_attempt: Duration, cap: Duration) -> Self {
        Self { per_attempt, cap }
    }

    /// Default policy for a single-endpoint topology: 50 ms per attempt,
    /// capped at 2 s.
    pub fn single_node() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(2000))
    }

    /// Default policy for a cluster topology: 100 ms per attempt, capped
    /// at 2 s.
    pub fn cluster() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(2000))
    }

    /// Returns the delay before the given attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.per_attempt.saturating_mul(attempt.max(1));
        scaled.min(self.cap)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::single_node()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node_schedule() {
        let policy = ReconnectPolicy::single_node();

        assert_eq!(policy.delay(1), Duration::from_millis(50));
        assert_eq!(policy.delay(2), Duration::from_millis(100));
        assert_eq!(policy.delay(10), Duration::from_millis(500));
        // Linear until the cap, then flat.
        assert_eq!(policy.delay(40), Duration::from_millis(2000));
        assert_eq!(policy.delay(1000), Duration::from_millis(2000));
    }

    #[test]
    fn test_cluster_schedule() {
        let policy = ReconnectPolicy::cluster();

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(3), Duration::from_millis(300));
        assert_eq!(policy.delay(20), Duration::from_millis(2000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let policy = ReconnectPolicy::single_node();
        assert_eq!(policy.delay(0), policy.delay(1));
    }
}
