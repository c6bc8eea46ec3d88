// ── Control facade ──
//
// The narrow surface the web layer calls. Collapses the internal
// failure taxonomy into `ServiceUnavailable` and serializes writes so
// concurrent toggles cannot interleave their write+verify sequences.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fritzgast_api::Tr064Client;
use fritzgast_api::transport::TransportConfig;

use crate::config::DeviceConfig;
use crate::endpoint::GuestWlanEndpoint;
use crate::error::ServiceUnavailable;
use crate::model::{DeviceState, GuestWifiInfo};
use crate::reconcile::{ReconcileConfig, Reconciler};

/// Guest WiFi control for one router.
pub struct GuestWifi<E> {
    reconciler: Reconciler<E>,
    /// At most one in-flight write per process; readers don't take it.
    write_lock: Mutex<()>,
}

impl GuestWifi<Tr064Client> {
    /// Build the full stack from configuration.
    ///
    /// No network contact happens here -- the first call authenticates
    /// on demand.
    pub fn new(config: DeviceConfig) -> Result<Self, ServiceUnavailable> {
        let transport = TransportConfig {
            timeout: config.timeout,
        };
        let client = Tr064Client::new(
            &config.url,
            config.username,
            config.password,
            &transport,
            config.session_ttl,
            config.auth_retry,
        )?;
        Ok(Self::with_endpoint(client, config.reconcile))
    }
}

impl<E: GuestWlanEndpoint> GuestWifi<E> {
    /// Assemble a facade over any endpoint implementation.
    pub fn with_endpoint(endpoint: E, config: ReconcileConfig) -> Self {
        Self {
            reconciler: Reconciler::new(endpoint, config),
            write_lock: Mutex::new(()),
        }
    }

    /// Current guest network state.
    pub async fn get_state(&self) -> Result<DeviceState, ServiceUnavailable> {
        self.reconciler.read().await.map_err(|e| {
            warn!(error = %e, "state read failed");
            e.into()
        })
    }

    /// Drive the guest network to `desired`, returning the verified
    /// state.
    ///
    /// Concurrent calls queue on the write lock; a verification timeout
    /// surfaces as [`ServiceUnavailable`] with the last-known state
    /// attached rather than a silent success.
    pub async fn set_state(
        &self,
        desired: bool,
        cancel: &CancellationToken,
    ) -> Result<DeviceState, ServiceUnavailable> {
        let _guard = self.write_lock.lock().await;
        self.reconciler.write(desired, cancel).await.map_err(|e| {
            warn!(error = %e, desired, "state change failed");
            e.into()
        })
    }

    /// State plus SSID for the overview payload.
    pub async fn info(&self) -> Result<GuestWifiInfo, ServiceUnavailable> {
        let state = self.get_state().await?;
        let ssid = self.reconciler.endpoint().read_ssid().await.map_err(|e| {
            warn!(error = %e, "SSID read failed");
            ServiceUnavailable::from(e)
        })?;
        Ok(GuestWifiInfo {
            enabled: state.enabled,
            ssid,
            observed_at: state.observed_at,
        })
    }

    /// Startup connectivity check: one read, outcome logged.
    pub async fn check(&self) -> Result<DeviceState, ServiceUnavailable> {
        match self.get_state().await {
            Ok(state) => {
                info!(enabled = state.enabled, "router reachable");
                Ok(state)
            }
            Err(e) => {
                warn!(error = %e, "router connectivity check failed");
                Err(e)
            }
        }
    }
}
