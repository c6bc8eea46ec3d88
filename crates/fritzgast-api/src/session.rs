// TR-064 session authentication
//
// The Fritz!Box authenticates SOAP calls with a challenge/response
// digest ("F!Box SOAP-Auth"): the router hands out a nonce, the client
// answers with MD5(MD5(user:realm:password):nonce), and every
// authenticated response rotates the nonce via `NextChallenge`.
//
// `SessionManager` owns the single live session. Transport failures
// during the handshake are retried with bounded exponential backoff;
// rejected credentials fail immediately.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::soap::{self, AuthHeader, SoapResponse};

// ── RetryConfig ──────────────────────────────────────────────────────

/// Exponential backoff configuration for the authentication handshake.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry. Default: 250ms.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 2s.
    pub max_delay: Duration,

    /// Total attempts (first try included). Default: 3.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            max_attempts: 3,
        }
    }
}

/// Backoff delay before retry number `attempt` (0-based), doubling up
/// to the configured cap.
pub(crate) fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    Duration::from_secs_f64(base.min(config.max_delay.as_secs_f64()))
}

// ── Session ──────────────────────────────────────────────────────────

/// An authenticated session with the router's management endpoint.
///
/// Holds the current nonce and realm from the last challenge plus the
/// precomputed credential secret. Value type: the manager hands out
/// clones and keeps the authoritative copy for nonce rotation.
#[derive(Debug, Clone)]
pub struct Session {
    user_id: String,
    realm: String,
    nonce: String,
    /// MD5(user:realm:password), hex-encoded.
    secret: String,
    established: Instant,
}

impl Session {
    fn new(user_id: String, realm: String, nonce: String, password: &SecretString) -> Self {
        let secret = md5_hex(&format!(
            "{user_id}:{realm}:{}",
            password.expose_secret()
        ));
        Self {
            user_id,
            realm,
            nonce,
            secret,
            established: Instant::now(),
        }
    }

    /// The digest to present for the current nonce.
    pub fn auth_digest(&self) -> String {
        md5_hex(&format!("{}:{}", self.secret, self.nonce))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    fn is_valid(&self, ttl: Duration) -> bool {
        self.established.elapsed() < ttl
    }

    fn rotate(&mut self, next_nonce: String) {
        self.nonce = next_nonce;
        self.established = Instant::now();
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}

// ── SessionManager ───────────────────────────────────────────────────

/// Credential and renewal settings for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub username: String,
    pub password: SecretString,
    /// Validity window after which the held session is renewed.
    pub session_ttl: Duration,
    pub retry: RetryConfig,
}

/// Owns the single live [`Session`] and renews it on demand.
pub struct SessionManager {
    http: reqwest::Client,
    control_url: Url,
    service_type: &'static str,
    probe_action: &'static str,
    config: SessionConfig,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a manager for one service control URL.
    ///
    /// `probe_action` is the idempotent read action used to carry the
    /// handshake headers (the handshake itself needs a host action).
    pub fn new(
        http: reqwest::Client,
        control_url: Url,
        service_type: &'static str,
        probe_action: &'static str,
        config: SessionConfig,
    ) -> Self {
        Self {
            http,
            control_url,
            service_type,
            probe_action,
            config,
            session: Mutex::new(None),
        }
    }

    /// Return a currently valid session, renewing transparently if the
    /// held one is expired or absent.
    ///
    /// Concurrent callers queue on the internal lock, so at most one
    /// handshake is in flight at a time.
    pub async fn acquire(&self) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.is_valid(self.config.session_ttl) {
                return Ok(session.clone());
            }
            debug!("held session past validity window, renewing");
        }

        let session = self.authenticate().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Mark the held session unusable, forcing renewal on next acquire.
    pub async fn invalidate(&self) {
        debug!("invalidating session");
        *self.session.lock().await = None;
    }

    /// Store the rotated nonce from an authenticated response.
    pub(crate) async fn rotate(&self, next_nonce: String) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.rotate(next_nonce);
        }
    }

    /// Run the handshake, absorbing transient transport failures with
    /// bounded backoff. Rejected credentials surface immediately.
    async fn authenticate(&self) -> Result<Session, Error> {
        let mut attempt: u32 = 0;

        loop {
            match self.handshake().await {
                Ok(session) => {
                    debug!("session authentication successful");
                    return Ok(session);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.config.retry.max_attempts => {
                    let delay = backoff_delay(attempt, &self.config.retry);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transport failure during authentication, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The two-round-trip challenge handshake:
    /// `InitChallenge` fetches nonce and realm, `ClientAuth` verifies
    /// the credentials and yields the nonce for subsequent calls.
    async fn handshake(&self) -> Result<Session, Error> {
        debug!(user = %self.config.username, url = %self.control_url, "starting auth handshake");

        // Round trip 1: obtain the challenge.
        let envelope = soap::build_envelope(
            self.probe_action,
            self.service_type,
            &[],
            Some(&AuthHeader::InitChallenge {
                user_id: &self.config.username,
            }),
        );
        let (_, body) = soap::post_soap(
            &self.http,
            self.control_url.clone(),
            self.service_type,
            self.probe_action,
            envelope,
        )
        .await?;
        let resp = SoapResponse::parse(body)?;
        let challenge = resp.challenge().ok_or_else(|| Error::Protocol {
            message: "handshake response carries no challenge header".into(),
            body: String::new(),
        })?;
        let nonce = challenge.nonce.ok_or_else(|| Error::Protocol {
            message: "challenge is missing a nonce".into(),
            body: String::new(),
        })?;
        let realm = challenge.realm.unwrap_or_else(|| "F!Box SOAP-Auth".to_owned());

        // Round trip 2: present the digest and verify it was accepted.
        let session = Session::new(self.config.username.clone(), realm, nonce, &self.config.password);
        let envelope = soap::build_envelope(
            self.probe_action,
            self.service_type,
            &[],
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
            self.service_type,
            self.probe_action,
            envelope,
        )
        .await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "credentials rejected (HTTP 401)".into(),
            });
        }

        let resp = SoapResponse::parse(body)?;
        match resp.challenge() {
            Some(next) if next.is_authenticated() => {
                let mut session = session;
                if let Some(next_nonce) = next.nonce {
                    session.rotate(next_nonce);
                }
                Ok(session)
            }
            // A challenge that is still "Unauthenticated" after we
            // presented the digest means the credentials are wrong.
            Some(_) => Err(Error::Authentication {
                message: "credentials rejected by router".into(),
            }),
            None => Err(Error::Protocol {
                message: "authenticated response carries no challenge header".into(),
                body: String::new(),
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
