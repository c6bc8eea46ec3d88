// Domain value types shared across the core.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One fresh observation of the guest network's enablement.
///
/// Never cached as ground truth -- every instance comes from a single
/// read of the router, stamped at observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub enabled: bool,
    pub observed_at: DateTime<Utc>,
}

impl DeviceState {
    pub(crate) fn observe(enabled: bool) -> Self {
        Self {
            enabled,
            observed_at: Utc::now(),
        }
    }
}

/// Guest network overview: state plus the network name.
#[derive(Debug, Clone, Serialize)]
pub struct GuestWifiInfo {
    pub enabled: bool,
    pub ssid: String,
    pub observed_at: DateTime<Utc>,
}
