// ── Runtime connection configuration ──
//
// Describes *how* to reach one router. Carries credentials and tuning
// but never touches disk or the environment: the embedding process
// loads its configuration, builds a `DeviceConfig`, and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use fritzgast_api::RetryConfig;

use crate::reconcile::ReconcileConfig;

/// Configuration for controlling a single router.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// TR-064 endpoint, e.g. `http://fritz.box:49000`.
    pub url: Url,
    /// API user (Fritz!Box "FRITZ!Box users" account).
    pub username: String,
    pub password: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Session validity window before transparent renewal.
    pub session_ttl: Duration,
    /// Backoff for transport failures during authentication.
    pub auth_retry: RetryConfig,
    /// Write verification behavior.
    pub reconcile: ReconcileConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: "http://fritz.box:49000"
                .parse()
                .expect("default endpoint URL is valid"),
            username: String::new(),
            password: SecretString::from(String::new()),
            timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(600),
            auth_retry: RetryConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}
