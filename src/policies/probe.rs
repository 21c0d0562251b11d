//! # Readiness probe policy.
//!
//! [`ProbePolicy`] controls how a freshly spawned server is polled until it
//! accepts connections:
//! - [`ProbePolicy::interval`] the pause between two ping attempts;
//! - [`ProbePolicy::attempt_timeout`] the bound on a single ping;
//! - [`ProbePolicy::jitter`] optional randomization of the pause.
//!
//! The overall bound is the cluster's setup deadline, not an attempt count.
//! The interval never grows: this is bounded-duration retry, not exponential
//! backoff.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use shardvisor::{JitterPolicy, ProbePolicy};
//!
//! let probe = ProbePolicy::default();
//! assert_eq!(probe.interval, Duration::from_millis(100));
//! assert_eq!(probe.attempt_timeout, Duration::from_millis(500));
//!
//! // Delay is constant without jitter.
//! assert_eq!(probe.next_delay(), Duration::from_millis(100));
//!
//! let spread = ProbePolicy { jitter: JitterPolicy::Equal, ..ProbePolicy::default() };
//! let d = spread.next_delay();
//! assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Readiness probe policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Pause between two consecutive ping attempts.
    pub interval: Duration,
    /// Upper bound for a single ping attempt.
    pub attempt_timeout: Duration,
    /// Randomization applied to `interval`.
    pub jitter: JitterPolicy,
}

impl Default for ProbePolicy {
    /// Returns a policy with:
    /// - `interval = 100ms`;
    /// - `attempt_timeout = 500ms`;
    /// - `jitter = None`.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            attempt_timeout: Duration::from_millis(500),
            jitter: JitterPolicy::None,
        }
    }
}

impl ProbePolicy {
    /// Returns the pause before the next attempt.
    pub fn next_delay(&self) -> Duration {
        self.jitter.apply(self.interval)
    }

    /// Returns the attempt timeout, floored at 1ms so a ping can ever succeed.
    #[inline]
    pub fn attempt_timeout_clamped(&self) -> Duration {
        self.attempt_timeout.max(Duration::from_millis(1))
    }
}
