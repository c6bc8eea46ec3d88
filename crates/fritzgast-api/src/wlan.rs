// Guest WLAN action invocation
//
// `Tr064Client` issues named TR-064 actions against the guest WLAN
// service (`WLANConfiguration:3`) through the session manager. Exactly
// one network call per invocation; an authentication-class failure
// invalidates the session once and retries the action a single time
// with a fresh session before surfacing.

use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::session::{RetryConfig, SessionConfig, SessionManager};
use crate::soap::{self, AuthHeader, SoapResponse};
use crate::transport::TransportConfig;

/// Service type URN of the guest WLAN (third WLAN configuration).
pub const GUEST_WLAN_SERVICE: &str = "urn:dslforum-org:service:WLANConfiguration:3";

/// Control URL path of the guest WLAN service.
pub const GUEST_WLAN_CONTROL_PATH: &str = "/upnp/control/wlanconfig3";

/// Fault code the router returns when the presented digest is rejected.
const FAULT_ACTION_NOT_AUTHORIZED: &str = "606";

// ── Request/result types ─────────────────────────────────────────────

/// A named remote action plus its arguments. Constructed per call.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub action: &'static str,
    pub arguments: Vec<(&'static str, String)>,
}

impl ActionRequest {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.arguments.push((name, value.into()));
        self
    }
}

/// Decoded response of a successful action.
#[derive(Debug)]
pub struct ActionResult {
    response: SoapResponse,
}

impl ActionResult {
    /// A required response argument (e.g. `NewStatus`); missing
    /// arguments are a [`Error::Protocol`].
    pub fn argument(&self, name: &str) -> Result<String, Error> {
        self.response.argument(name)
    }

    /// A response argument that may be absent.
    pub fn opt_argument(&self, name: &str) -> Option<String> {
        self.response.opt_argument(name)
    }
}

/// Current guest WLAN state from `GetInfo`.
///
/// `enabled` is derived from `NewStatus == "Up"` -- the status field is
/// authoritative, `NewEnable` can already be flipped while the radio is
/// still coming up.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WlanInfo {
    pub enabled: bool,
    pub status: String,
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for the guest WLAN service of a Fritz!Box.
pub struct Tr064Client {
    http: reqwest::Client,
    control_url: Url,
    sessions: SessionManager,
}

impl Tr064Client {
    /// Create a client for the router at `endpoint`
    /// (e.g. `http://fritz.box:49000`).
    pub fn new(
        endpoint: &Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
        session_ttl: Duration,
        retry: RetryConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let control_url = endpoint.join(GUEST_WLAN_CONTROL_PATH)?;

        let sessions = SessionManager::new(
            http.clone(),
            control_url.clone(),
            GUEST_WLAN_SERVICE,
            "GetInfo",
            SessionConfig {
                username,
                password,
                session_ttl,
                retry,
            },
        );

        Ok(Self {
            http,
            control_url,
            sessions,
        })
    }

    /// The session manager (for explicit invalidation/teardown).
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    // ── Action invocation ────────────────────────────────────────────

    /// Invoke a named action, recovering from session expiry once.
    pub async fn invoke(&self, request: &ActionRequest) -> Result<ActionResult, Error> {
        match self.invoke_once(request).await {
            Err(e) if e.is_auth_expired() => {
                debug!(action = request.action, "session rejected, retrying with fresh session");
                self.sessions.invalidate().await;
                self.invoke_once(request).await.map_err(|retry_err| {
                    if retry_err.is_auth_expired() {
                        // A fresh session was rejected too -- that is a
                        // credentials problem, not expiry.
                        Error::Authentication {
                            message: "freshly acquired session rejected by router".into(),
                        }
                    } else {
                        retry_err
                    }
                })
            }
            other => other,
        }
    }

    /// One authenticated SOAP round trip.
    async fn invoke_once(&self, request: &ActionRequest) -> Result<ActionResult, Error> {
        let session = self.sessions.acquire().await?;

        let envelope = soap::build_envelope(
            request.action,
            GUEST_WLAN_SERVICE,
            &request.arguments,
            Some(&AuthHeader::ClientAuth {
                user_id: session.user_id(),
                realm: session.realm(),
                nonce: session.nonce(),
                auth: &session.auth_digest(),
            }),
        );

        let (status, body) = soap::post_soap(
            &self.http,
            self.control_url.clone(),
            GUEST_WLAN_SERVICE,
            request.action,
            envelope,
        )
        .await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        let response = SoapResponse::parse(body)?;

        // An "Unauthenticated" challenge on an authenticated call means
        // the nonce went stale; rotate on success.
        if let Some(challenge) = response.challenge() {
            if !challenge.is_authenticated() {
                return Err(Error::SessionExpired);
            }
            if let Some(next_nonce) = challenge.nonce {
                self.sessions.rotate(next_nonce).await;
            }
        }

        if let Some(fault) = response.fault() {
            if matches!(&fault, Error::UpnpFault { code, .. } if code == FAULT_ACTION_NOT_AUTHORIZED)
            {
                return Err(Error::SessionExpired);
            }
            return Err(fault);
        }

        Ok(ActionResult { response })
    }

    // ── Typed actions ────────────────────────────────────────────────

    /// Read the guest WLAN state.
    ///
    /// `GetInfo` -- `NewStatus` is `"Up"` when the network is live.
    pub async fn get_info(&self) -> Result<WlanInfo, Error> {
        let result = self.invoke(&ActionRequest::new("GetInfo")).await?;
        let status = result.argument("NewStatus")?;
        Ok(WlanInfo {
            enabled: status == "Up",
            status,
        })
    }

    /// Read the guest WLAN SSID via `GetSSID`.
    pub async fn get_ssid(&self) -> Result<String, Error> {
        let result = self.invoke(&ActionRequest::new("GetSSID")).await?;
        result.argument("NewSSID")
    }

    /// Request enablement via `SetEnable`.
    ///
    /// The router acknowledges before the radio state actually changes;
    /// callers must verify with subsequent reads.
    pub async fn set_enable(&self, enable: bool) -> Result<(), Error> {
        debug!(enable, "setting guest WLAN enablement");
        let request = ActionRequest::new("SetEnable")
            .argument("NewEnable", if enable { "1" } else { "0" });
        self.invoke(&request).await?;
        Ok(())
    }
}
