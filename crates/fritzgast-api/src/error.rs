use thiserror::Error;

/// Top-level error type for the `fritzgast-api` crate.
///
/// Covers every failure mode of the TR-064 exchange: authentication,
/// transport, and protocol decoding. `fritzgast-core` maps these into
/// its reconciliation outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials were rejected by the router. Fatal -- never retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session nonce is stale or revoked. A fresh handshake
    /// usually resolves it.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// Structured UPnP fault from the router (parsed from `<s:Fault>`).
    #[error("UPnP fault {code}: {description}")]
    UpnpFault { code: String, description: String },

    /// The SOAP response was malformed or missing an expected element,
    /// with the raw body for debugging. Signals a protocol/firmware
    /// mismatch, not a transient condition -- never retried.
    #[error("Protocol error: {message}")]
    Protocol { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
