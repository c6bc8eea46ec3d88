// SOAP envelope codec for TR-064
//
// Hand-rolled builder/scanner for the small, fixed envelope shapes the
// Fritz!Box emits. Requests are assembled from string templates; responses
// are scanned for known tags. A body that doesn't look like a SOAP
// envelope at all is a `Protocol` error.

use reqwest::StatusCode;
use url::Url;

use crate::error::Error;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const AUTH_NS: &str = "http://soap-authentication.org/digest/2001/10/";

// ── Request building ─────────────────────────────────────────────────

/// The authentication header to attach to a request.
///
/// TR-064 uses the AVM challenge/response scheme carried in SOAP headers:
/// `InitChallenge` asks the router for a nonce, `ClientAuth` presents the
/// digest computed from it.
#[derive(Debug)]
pub(crate) enum AuthHeader<'a> {
    InitChallenge {
        user_id: &'a str,
    },
    ClientAuth {
        user_id: &'a str,
        realm: &'a str,
        nonce: &'a str,
        auth: &'a str,
    },
}

/// Assemble a full SOAP envelope for `action` on `service_type`.
pub(crate) fn build_envelope(
    action: &str,
    service_type: &str,
    arguments: &[(&str, String)],
    auth: Option<&AuthHeader<'_>>,
) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    xml.push_str(&format!(
        "<s:Envelope xmlns:s=\"{SOAP_ENVELOPE_NS}\" s:encodingStyle=\"{SOAP_ENCODING_NS}\">"
    ));

    if let Some(auth) = auth {
        xml.push_str("<s:Header>");
        match auth {
            AuthHeader::InitChallenge { user_id } => {
                xml.push_str(&format!(
                    "<h:InitChallenge xmlns:h=\"{AUTH_NS}\" s:mustUnderstand=\"1\">\
                     <UserID>{}</UserID>\
                     </h:InitChallenge>",
                    escape(user_id)
                ));
            }
            AuthHeader::ClientAuth {
                user_id,
                realm,
                nonce,
                auth,
            } => {
                xml.push_str(&format!(
                    "<h:ClientAuth xmlns:h=\"{AUTH_NS}\" s:mustUnderstand=\"1\">\
                     <Nonce>{}</Nonce>\
                     <Auth>{}</Auth>\
                     <UserID>{}</UserID>\
                     <Realm>{}</Realm>\
                     </h:ClientAuth>",
                    escape(nonce),
                    escape(auth),
                    escape(user_id),
                    escape(realm)
                ));
            }
        }
        xml.push_str("</s:Header>");
    }

    xml.push_str("<s:Body>");
    xml.push_str(&format!("<u:{action} xmlns:u=\"{service_type}\">"));
    for (name, value) in arguments {
        xml.push_str(&format!("<{name}>{}</{name}>", escape(value)));
    }
    xml.push_str(&format!("</u:{action}>"));
    xml.push_str("</s:Body></s:Envelope>");
    xml
}

/// POST an envelope to the service control URL.
///
/// Returns the HTTP status and raw body; interpretation (401, SOAP
/// faults, challenge headers) is up to the caller.
pub(crate) async fn post_soap(
    http: &reqwest::Client,
    control_url: Url,
    service_type: &str,
    action: &str,
    envelope: String,
) -> Result<(StatusCode, String), Error> {
    tracing::debug!(%control_url, action, "POST SOAP action");

    let resp = http
        .post(control_url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{service_type}#{action}\""))
        .body(envelope)
        .send()
        .await
        .map_err(Error::Transport)?;

    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    Ok((status, body))
}

// ── Response scanning ────────────────────────────────────────────────

/// Challenge material carried in the SOAP header of a response.
///
/// Appears both as `<h:Challenge>` (handshake) and `<h:NextChallenge>`
/// (nonce rotation after an authenticated call).
#[derive(Debug, Clone)]
pub(crate) struct Challenge {
    pub status: String,
    pub nonce: Option<String>,
    pub realm: Option<String>,
}

impl Challenge {
    pub fn is_authenticated(&self) -> bool {
        self.status == "Authenticated"
    }
}

/// A decoded SOAP response body.
#[derive(Debug)]
pub(crate) struct SoapResponse {
    body: String,
}

impl SoapResponse {
    /// Wrap a response body, rejecting anything that isn't a SOAP envelope.
    pub fn parse(body: String) -> Result<Self, Error> {
        if !body.contains("Envelope") {
            return Err(Error::Protocol {
                message: "response is not a SOAP envelope".into(),
                body,
            });
        }
        Ok(Self { body })
    }

    /// Extract a response argument (e.g. `NewStatus`), unescaped.
    pub fn argument(&self, name: &str) -> Result<String, Error> {
        self.opt_argument(name).ok_or_else(|| Error::Protocol {
            message: format!("missing response argument <{name}>"),
            body: self.body.clone(),
        })
    }

    /// Extract a response argument that may legitimately be absent.
    pub fn opt_argument(&self, name: &str) -> Option<String> {
        text_between(&self.body, name).map(unescape)
    }

    /// Extract the challenge block from the header, if present.
    pub fn challenge(&self) -> Option<Challenge> {
        let status = text_between(&self.body, "Status")?;
        Some(Challenge {
            status: status.to_owned(),
            // NextNonce supersedes Nonce when both would apply.
            nonce: text_between(&self.body, "NextNonce")
                .or_else(|| text_between(&self.body, "Nonce"))
                .map(ToOwned::to_owned),
            realm: text_between(&self.body, "Realm").map(ToOwned::to_owned),
        })
    }

    /// Extract a UPnP fault, if the body carries one.
    pub fn fault(&self) -> Option<Error> {
        if !self.body.contains("Fault>") {
            return None;
        }
        let code = text_between(&self.body, "errorCode")
            .or_else(|| text_between(&self.body, "faultcode"))
            .unwrap_or("unknown");
        let description = text_between(&self.body, "errorDescription")
            .or_else(|| text_between(&self.body, "faultstring"))
            .unwrap_or("");
        Some(Error::UpnpFault {
            code: code.to_owned(),
            description: description.to_owned(),
        })
    }
}

/// Text content of the first `<tag>...</tag>` occurrence.
fn text_between<'a>(haystack: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = haystack.find(&open)? + open.len();
    let end = haystack[start..].find(&close)? + start;
    Some(&haystack[start..end])
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ── Tests ────────────────────────────────────────────────────────────
