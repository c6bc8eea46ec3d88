// ── Core error types ──
//
// `ReconcileError` is the internal taxonomy of one read/write cycle.
// `ServiceUnavailable` is the single externally stable failure the
// facade exposes -- consumers outside the core never see the
// protocol-specific kinds, only "not currently usable" plus whatever
// last-known state the failure left behind.

use thiserror::Error;

use crate::model::DeviceState;

/// Outcome taxonomy of the reconciler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Failure from the protocol layer (authentication, transport,
    /// malformed response). Already classified and retried there where
    /// appropriate.
    #[error(transparent)]
    Api(#[from] fritzgast_api::Error),

    /// The write was accepted but not observably applied within budget.
    /// Carries the most recent (possibly stale) observation so callers
    /// can still present something meaningful.
    #[error("state change not observed after {attempts} verification attempts")]
    Timeout {
        attempts: u32,
        last_known: Option<DeviceState>,
    },

    /// The enclosing request was cancelled mid-verification.
    #[error("reconciliation cancelled")]
    Cancelled { last_known: Option<DeviceState> },
}

impl ReconcileError {
    /// The last observation carried by this error, if any.
    pub fn last_known(&self) -> Option<DeviceState> {
        match self {
            Self::Timeout { last_known, .. } | Self::Cancelled { last_known } => *last_known,
            Self::Api(_) => None,
        }
    }
}

/// The one failure shape exposed to the web layer.
#[derive(Debug, Error)]
#[error("guest WiFi control unavailable: {detail}")]
pub struct ServiceUnavailable {
    /// Human-readable detail for display/logs.
    pub detail: String,
    /// Last observed state, when the failure left one behind.
    pub last_known: Option<DeviceState>,
}

impl From<ReconcileError> for ServiceUnavailable {
    fn from(err: ReconcileError) -> Self {
        Self {
            last_known: err.last_known(),
            detail: err.to_string(),
        }
    }
}

impl From<fritzgast_api::Error> for ServiceUnavailable {
    fn from(err: fritzgast_api::Error) -> Self {
        Self {
            detail: err.to_string(),
            last_known: None,
        }
    }
}
