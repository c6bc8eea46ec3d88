// ── State reconciliation ──
//
// The router acknowledges `SetEnable` before the radio actually changes
// state; a read issued right after a write can still return the old
// value for several seconds. `Reconciler::write` collapses that window
// into one deterministic outcome: the verified new state, or a typed
// timeout carrying the last observation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::endpoint::GuestWlanEndpoint;
use crate::error::ReconcileError;
use crate::model::DeviceState;

// ── ReconcileConfig ──────────────────────────────────────────────────

/// Bounds for the verify-after-write loop.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Verification attempt ceiling. Default: 6.
    pub max_attempts: u32,

    /// Wall-clock budget for the whole loop. Default: 10s.
    pub budget: Duration,

    /// Delay before the first verification read. Default: 500ms.
    /// The device needs more than 3 seconds end to end for a status
    /// change; early reads are cheap and catch fast flips.
    pub initial_delay: Duration,

    /// Cap for the growing inter-attempt delay. Default: 3s.
    pub max_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            budget: Duration::from_secs(10),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        }
    }
}

impl ReconcileConfig {
    /// Delay before verification attempt `attempt` (1-based), doubling
    /// from `initial_delay` up to `max_delay`.
    fn verify_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Orchestrates toggle requests against one endpoint.
pub struct Reconciler<E> {
    endpoint: E,
    config: ReconcileConfig,
}

impl<E: GuestWlanEndpoint> Reconciler<E> {
    pub fn new(endpoint: E, config: ReconcileConfig) -> Self {
        Self { endpoint, config }
    }

    /// The underlying endpoint (for reads outside the reconcile cycle).
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// One fresh observation.
    ///
    /// Reads are idempotent and safe to fail outward directly; the only
    /// recovery below this point is the invoker's session renewal.
    pub async fn read(&self) -> Result<DeviceState, ReconcileError> {
        let enabled = self.endpoint.read_enabled().await?;
        Ok(DeviceState::observe(enabled))
    }

    /// Drive the device to `desired` and verify the change took effect.
    ///
    /// Already-matching state short-circuits without a write. Otherwise
    /// the set action is issued and verified by re-reading with growing
    /// delays until the state matches, the attempt/budget bounds are
    /// exhausted, or `cancel` fires.
    pub async fn write(
        &self,
        desired: bool,
        cancel: &CancellationToken,
    ) -> Result<DeviceState, ReconcileError> {
        let current = with_cancel(cancel, None, self.read()).await?;
        if current.enabled == desired {
            debug!(desired, "device already in desired state, skipping write");
            return Ok(current);
        }

        with_cancel(cancel, Some(current), async {
            self.endpoint
                .write_enabled(desired)
                .await
                .map_err(ReconcileError::Api)
        })
        .await?;
        info!(desired, "state change requested, verifying");

        let started = Instant::now();
        let mut last_known = current;

        for attempt in 1..=self.config.max_attempts {
            let remaining = self.config.budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    attempts = attempt - 1,
                    desired, "verification budget exhausted"
                );
                return Err(ReconcileError::Timeout {
                    attempts: attempt - 1,
                    last_known: Some(last_known),
                });
            }

            let delay = self.config.verify_delay(attempt).min(remaining);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt, "reconciliation cancelled");
                    return Err(ReconcileError::Cancelled {
                        last_known: Some(last_known),
                    });
                }
                () = tokio::time::sleep(delay) => {}
            }

            let observed = with_cancel(cancel, Some(last_known), self.read()).await?;
            debug!(
                attempt,
                observed = observed.enabled,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "verification read"
            );

            if observed.enabled == desired {
                info!(attempts = attempt, desired, "state change verified");
                return Ok(observed);
            }
            last_known = observed;
        }

        warn!(
            attempts = self.config.max_attempts,
            desired, "state change not observable within attempt ceiling"
        );
        Err(ReconcileError::Timeout {
            attempts: self.config.max_attempts,
            last_known: Some(last_known),
        })
    }
}

/// Race one protocol call against cancellation.
///
/// Dropping the in-flight future aborts its network round trip, so a
/// cancelled caller releases the write lock promptly instead of riding
/// out the HTTP timeout.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    last_known: Option<DeviceState>,
    call: impl Future<Output = Result<T, ReconcileError>>,
) -> Result<T, ReconcileError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ReconcileError::Cancelled { last_known }),
        result = call => result,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_delay_doubles_and_caps() {
        let config = ReconcileConfig::default();

        assert_eq!(config.verify_delay(1), Duration::from_millis(500));
        assert_eq!(config.verify_delay(2), Duration::from_secs(1));
        assert_eq!(config.verify_delay(3), Duration::from_secs(2));
        assert_eq!(config.verify_delay(4), Duration::from_secs(3));
        assert_eq!(config.verify_delay(9), Duration::from_secs(3));
    }
}
