//! # Readiness probing for a freshly spawned server.
//!
//! [`ensure_server`] pings the server until it answers, the setup deadline
//! elapses, or the scope is cancelled.
//!
//! ```text
//! loop {
//!   ├─► scope cancelled?      → Canceled (permanent, no retry)
//!   ├─► deadline passed?      → ReadinessTimeout { last error }
//!   ├─► ping (≤ attempt_timeout, ≤ time left)
//!   │       ├─ Ok             → log "Connected", return elapsed
//!   │       └─ Err / timeout  → remember as last error
//!   └─► sleep(interval ± jitter), cut short by deadline or cancellation
//! }
//! ```
//!
//! There is no attempt cap; the deadline is the only bound.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::AdminClient;
use crate::error::{ClientError, ClusterError, Result};
use crate::policies::ProbePolicy;

/// Waits until `client` answers a ping.
///
/// Returns the time it took. Fails with [`ClusterError::ReadinessTimeout`]
/// once `deadline` has elapsed, or [`ClusterError::Canceled`] as soon as
/// `ctx` is cancelled.
pub async fn ensure_server(
    ctx: &CancellationToken,
    service: &str,
    client: &dyn AdminClient,
    deadline: Duration,
    policy: &ProbePolicy,
) -> Result<Duration> {
    let start = Instant::now();
    let deadline_at = start + deadline;
    let mut last: Option<String> = None;
    let mut attempts: u64 = 0;

    loop {
        if ctx.is_cancelled() {
            return Err(ClusterError::Canceled);
        }
        let remaining = deadline_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(attempts, last = ?last, "Server did not become ready");
            return Err(ClusterError::ReadinessTimeout {
                service: service.to_string(),
                deadline,
                last,
            });
        }

        attempts += 1;
        let bound = policy.attempt_timeout_clamped().min(remaining);
        let res = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ClusterError::Canceled),
            res = time::timeout(bound, client.ping()) => res,
        };
        match res {
            Ok(Ok(())) => {
                let elapsed = start.elapsed();
                tracing::info!(d = ?elapsed, attempts, "Connected");
                return Ok(elapsed);
            }
            Ok(Err(e)) => {
                tracing::trace!(attempt = attempts, error = %e, "Ping failed");
                last = Some(e.to_string());
            }
            Err(_elapsed) => {
                tracing::trace!(attempt = attempts, "Ping timed out");
                last = Some(ClientError::Timeout(bound).to_string());
            }
        }

        let wake = (Instant::now() + policy.next_delay()).min(deadline_at);
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ClusterError::Canceled),
            _ = time::sleep_until(wake) => {}
        }
    }
}
