#![allow(clippy::unwrap_used)]
// Integration tests for `Tr064Client` against a scripted TR-064 router.
//
// The responder emulates the F!Box SOAP-Auth handshake at the protocol
// level (challenge headers, nonce rotation, faults) without verifying
// digests -- what matters here is how the client reacts to each shape
// of response.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use fritzgast_api::transport::TransportConfig;
use fritzgast_api::{Error, RetryConfig, Tr064Client};

const REALM: &str = "F!Box SOAP-Auth";
const CONTROL_PATH: &str = "/upnp/control/wlanconfig3";

// ── Scripted router ─────────────────────────────────────────────────

#[derive(Default)]
struct RouterState {
    nonce_counter: u32,
    /// Reject every `ClientAuth` (wrong credentials).
    reject_client_auth: bool,
    /// Reject the next N `ClientAuth` requests (stale session).
    reject_next: u32,
    /// Answer `SetEnable` with a UPnP fault.
    fault_on_set: bool,
    /// Answer the next action with a non-SOAP body.
    garbage_on_action: bool,
    enabled: bool,
    set_calls: u32,
    requests: u32,
}

struct ScriptedRouter(Arc<Mutex<RouterState>>);

impl Respond for ScriptedRouter {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.0.lock().unwrap();
        state.requests += 1;
        state.nonce_counter += 1;
        let nonce = format!("N{:08}", state.nonce_counter);

        let body = String::from_utf8_lossy(&request.body);

        if body.contains("InitChallenge") {
            return xml_response(200, &challenge_body("Unauthenticated", &nonce));
        }

        // ClientAuth request.
        if state.reject_client_auth {
            return xml_response(200, &challenge_body("Unauthenticated", &nonce));
        }
        if state.reject_next > 0 {
            state.reject_next -= 1;
            return xml_response(200, &challenge_body("Unauthenticated", &nonce));
        }

        if state.garbage_on_action {
            state.garbage_on_action = false;
            return ResponseTemplate::new(200)
                .set_body_raw("<html>surprise</html>".to_owned(), "text/html");
        }

        if body.contains("u:SetEnable") {
            state.set_calls += 1;
            if state.fault_on_set {
                return xml_response(500, &fault_body("714", "NoSuchEntryInArray"));
            }
            state.enabled = body.contains("<NewEnable>1</NewEnable>");
            return xml_response(
                200,
                &authenticated_body(
                    "<u:SetEnableResponse xmlns:u=\"urn:dslforum-org:service:WLANConfiguration:3\"></u:SetEnableResponse>",
                    &nonce,
                ),
            );
        }

        if body.contains("u:GetSSID") {
            return xml_response(
                200,
                &authenticated_body(
                    "<u:GetSSIDResponse xmlns:u=\"urn:dslforum-org:service:WLANConfiguration:3\">\
                     <NewSSID>FRITZ!Box Gastzugang</NewSSID>\
                     </u:GetSSIDResponse>",
                    &nonce,
                ),
            );
        }

        // GetInfo (also carries the handshake verification round trip).
        let status = if state.enabled { "Up" } else { "Disabled" };
        let enable = if state.enabled { "1" } else { "0" };
        xml_response(
            200,
            &authenticated_body(
                &format!(
                    "<u:GetInfoResponse xmlns:u=\"urn:dslforum-org:service:WLANConfiguration:3\">\
                     <NewEnable>{enable}</NewEnable>\
                     <NewStatus>{status}</NewStatus>\
                     </u:GetInfoResponse>"
                ),
                &nonce,
            ),
        )
    }
}

fn xml_response(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_owned(), "text/xml")
}

fn challenge_body(status: &str, nonce: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Header>\
         <h:Challenge xmlns:h=\"http://soap-authentication.org/digest/2001/10/\">\
         <Status>{status}</Status><Nonce>{nonce}</Nonce><Realm>{REALM}</Realm>\
         </h:Challenge>\
         </s:Header><s:Body></s:Body></s:Envelope>"
    )
}

fn authenticated_body(inner: &str, next_nonce: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Header>\
         <h:NextChallenge xmlns:h=\"http://soap-authentication.org/digest/2001/10/\">\
         <Status>Authenticated</Status><NextNonce>{next_nonce}</NextNonce><Realm>{REALM}</Realm>\
         </h:NextChallenge>\
         </s:Header><s:Body>{inner}</s:Body></s:Envelope>"
    )
}

fn fault_body(code: &str, description: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Body><s:Fault>\
         <faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring>\
         <detail><UPnPError><errorCode>{code}</errorCode>\
         <errorDescription>{description}</errorDescription></UPnPError></detail>\
         </s:Fault></s:Body></s:Envelope>"
    )
}

// ── Helpers ─────────────────────────────────────────────────────────

fn quick_retry() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        max_attempts: 2,
    }
}

async fn setup(state: Arc<Mutex<RouterState>>) -> (MockServer, Tr064Client) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CONTROL_PATH))
        .respond_with(ScriptedRouter(Arc::clone(&state)))
        .mount(&server)
        .await;

    let client = Tr064Client::new(
        &Url::parse(&server.uri()).unwrap(),
        "admin".to_owned(),
        SecretString::from("test-password".to_owned()),
        &TransportConfig {
            timeout: Duration::from_secs(5),
        },
        Duration::from_secs(600),
        quick_retry(),
    )
    .unwrap();

    (server, client)
}

fn requests(state: &Arc<Mutex<RouterState>>) -> u32 {
    state.lock().unwrap().requests
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn get_info_authenticates_then_reads() {
    let state = Arc::new(Mutex::new(RouterState {
        enabled: true,
        ..RouterState::default()
    }));
    let (_server, client) = setup(Arc::clone(&state)).await;

    let info = client.get_info().await.unwrap();

    assert!(info.enabled);
    assert_eq!(info.status, "Up");
    // InitChallenge + handshake verification + action.
    assert_eq!(requests(&state), 3);
}

#[tokio::test]
async fn session_is_reused_across_calls() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    let first = client.get_info().await.unwrap();
    let second = client.get_info().await.unwrap();

    assert!(!first.enabled);
    assert!(!second.enabled);
    // Second call rides the existing session: one request only.
    assert_eq!(requests(&state), 4);
}

#[tokio::test]
async fn get_ssid_returns_network_name() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    let ssid = client.get_ssid().await.unwrap();

    assert_eq!(ssid, "FRITZ!Box Gastzugang");
}

#[tokio::test]
async fn set_enable_issues_write_action() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    client.set_enable(true).await.unwrap();

    let guard = state.lock().unwrap();
    assert_eq!(guard.set_calls, 1);
    assert!(guard.enabled);
}

// ── Authentication behavior ─────────────────────────────────────────

#[tokio::test]
async fn bad_credentials_fail_fast_without_retry() {
    let state = Arc::new(Mutex::new(RouterState {
        reject_client_auth: true,
        ..RouterState::default()
    }));
    let (_server, client) = setup(Arc::clone(&state)).await;

    let result = client.get_info().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    // InitChallenge + one rejected verification. No retries.
    assert_eq!(requests(&state), 2);
}

#[tokio::test]
async fn expired_session_is_renewed_once_transparently() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    client.get_info().await.unwrap();
    assert_eq!(requests(&state), 3);

    // Router forgets the session: next ClientAuth is rejected once.
    state.lock().unwrap().reject_next = 1;

    let info = client.get_info().await.unwrap();

    assert!(!info.enabled);
    // Rejected action + fresh handshake (2) + retried action.
    assert_eq!(requests(&state), 7);
}

#[tokio::test]
async fn persistent_session_rejection_is_bounded() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    client.get_info().await.unwrap();

    // Every further ClientAuth is rejected -- the retry must not loop.
    state.lock().unwrap().reject_client_auth = true;

    let result = client.get_info().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    // Rejected action + InitChallenge + rejected verification, then stop.
    assert_eq!(requests(&state), 6);
}

// ── Transport behavior ──────────────────────────────────────────────

#[tokio::test]
async fn request_timeout_is_retried_up_to_the_bound() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CONTROL_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let client = Tr064Client::new(
        &Url::parse(&server.uri()).unwrap(),
        "admin".to_owned(),
        SecretString::from("test-password".to_owned()),
        &TransportConfig {
            timeout: Duration::from_millis(50),
        },
        Duration::from_secs(600),
        quick_retry(),
    )
    .unwrap();

    let result = client.get_info().await;

    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
    // Mock::expect(2) verifies both attempts on drop.
}

#[tokio::test]
async fn connection_refused_surfaces_as_transport() {
    let client = Tr064Client::new(
        &Url::parse("http://127.0.0.1:9").unwrap(),
        "admin".to_owned(),
        SecretString::from("test-password".to_owned()),
        &TransportConfig {
            timeout: Duration::from_millis(200),
        },
        Duration::from_secs(600),
        RetryConfig {
            max_attempts: 1,
            ..quick_retry()
        },
    )
    .unwrap();

    let result = client.get_info().await;

    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}

// ── Protocol behavior ───────────────────────────────────────────────

#[tokio::test]
async fn upnp_fault_is_fatal_and_not_retried() {
    let state = Arc::new(Mutex::new(RouterState {
        fault_on_set: true,
        ..RouterState::default()
    }));
    let (_server, client) = setup(Arc::clone(&state)).await;

    let result = client.set_enable(true).await;

    match result {
        Err(Error::UpnpFault { ref code, .. }) => assert_eq!(code, "714"),
        other => panic!("expected UpnpFault, got: {other:?}"),
    }
    // Handshake (2) + single faulted action.
    assert_eq!(requests(&state), 3);
    assert_eq!(state.lock().unwrap().set_calls, 1);
}

#[tokio::test]
async fn malformed_body_is_a_protocol_error() {
    let state = Arc::new(Mutex::new(RouterState::default()));
    let (_server, client) = setup(Arc::clone(&state)).await;

    client.get_info().await.unwrap();
    state.lock().unwrap().garbage_on_action = true;

    let result = client.get_info().await;

    assert!(
        matches!(result, Err(Error::Protocol { .. })),
        "expected Protocol error, got: {result:?}"
    );
    // The malformed response is consumed by exactly one request.
    assert_eq!(requests(&state), 4);
}
