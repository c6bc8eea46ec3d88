// Shared transport configuration for building reqwest::Client instances.
//
// The TR-064 endpoint is plain HTTP on the LAN side of the router
// (default port 49000), so there are no TLS knobs here -- only the
// request timeout and user agent.

use std::time::Duration;

/// Transport configuration for the TR-064 HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("fritzgast/0.1.0")
            .build()
            .map_err(crate::error::Error::Transport)
    }
}
