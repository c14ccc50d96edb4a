use std::time::SystemTime;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use crate::errors::GatewayError;
use crate::shared_types::SessionId;

type HmacSha256 = Hmac<Sha256>;

// -----------------------------------------------------------------------------
// ----- Signatures ------------------------------------------------------------

/// `base64(HMAC-SHA256(secret, challenge))`, what a client sends back to
/// prove it knows the secret.
pub fn auth_signature(challenge: &str, secret: &str) -> String {
    let mac = keyed_mac(challenge, secret);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of a client signature against the challenge.
pub fn verify_signature(challenge: &str, secret: &str, signature: &str) -> bool {
    let Ok(raw) = STANDARD.decode(signature.trim()) else {
        return false;
    };

    keyed_mac(challenge, secret).verify_slice(&raw).is_ok()
}

fn keyed_mac(challenge: &str, secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(challenge.as_bytes());
    mac
}

// -----------------------------------------------------------------------------
// ----- Challenge -------------------------------------------------------------

/// The challenge document returned by `authreq`. Clients sign its exact
/// serialized text.
#[derive(Debug, Clone, Serialize)]
pub struct Challenge<'a> {
    pub authid: String,
    pub authkey: &'a str,
    pub timestamp: String,
    pub sessionid: &'a str,
    pub extra: &'a Value,
    pub permissions: &'a [String],
}

impl<'a> Challenge<'a> {
    pub fn new(
        authkey: &'a str,
        session_id: &'a SessionId,
        extra: &'a Value,
        permissions: &'a [String],
    ) -> Self {
        Self {
            authid: SessionId::random().to_string(),
            authkey,
            timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            sessionid: session_id.as_str(),
            extra,
            permissions,
        }
    }

    pub fn to_text(&self) -> Result<String, GatewayError> {
        serde_json::to_string(self)
            .map_err(|e| GatewayError::Protocol(format!("cannot serialize challenge: {e}")))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_hmac_vector() {
        let sig = auth_signature("The quick brown fox jumps over the lazy dog", "key");
        assert_eq!(sig, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn verify_accepts_matching_signature_only() {
        let sig = auth_signature("challenge", "secret");
        assert_eq!(sig, "oeUF6Wxqoezggrue+wbIDxKRPSF6esKwizR2MHh9HaA=");

        assert!(verify_signature("challenge", "secret", &sig));
        assert!(!verify_signature("challenge", "other", &sig));
        assert!(!verify_signature("challenge", "secret", "not base64 !!"));
        assert!(!verify_signature("challenge", "secret", ""));
    }

    #[test]
    fn challenge_carries_session_and_permissions() {
        let session_id = SessionId::random();
        let extra = json!({"permissions": "[\"org.ofono\"]"});
        let permissions = vec!["org.ofono".to_string()];

        let challenge = Challenge::new("cloudeebus", &session_id, &extra, &permissions);
        let text = challenge.to_text().unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["authkey"], "cloudeebus");
        assert_eq!(doc["sessionid"], session_id.as_str());
        assert_eq!(doc["permissions"], json!(["org.ofono"]));
        assert_eq!(doc["authid"].as_str().unwrap().len(), 16);
        assert!(doc["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
