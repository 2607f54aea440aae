//! Client-side session state, sealed into a signed cookie.
//!
//! The cookie value is `base64url(json-payload).hex(hmac-sha256-tag)`.
//! Anything that fails to verify opens to `None` and the caller treats the
//! request as anonymous.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    /// Identity-provider user id of the authenticated principal.
    pub user_id: String,
    /// Provider access token, when the session was provider-issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionData {
    pub fn local(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn provider(user_id: &str, access_token: &str, refresh_token: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: Some(access_token.to_string()),
            refresh_token: Some(refresh_token.to_string()),
        }
    }
}

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key of any length")
}

/// Seal session data into a signed cookie value.
pub fn seal(secret: &str, data: &SessionData) -> Result<String, serde_json::Error> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?);
    let mut m = mac(secret);
    m.update(payload.as_bytes());
    let tag = hex::encode(m.finalize().into_bytes());
    Ok(format!("{}.{}", payload, tag))
}

/// Verify and decode a cookie value. Returns `None` for malformed input,
/// a bad signature, or an undecodable payload.
pub fn open(secret: &str, value: &str) -> Option<SessionData> {
    let (payload, tag_hex) = value.split_once('.')?;
    let tag = hex::decode(tag_hex).ok()?;
    let mut m = mac(secret);
    m.update(payload.as_bytes());
    m.verify_slice(&tag).ok()?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn cookie(name: &str, value: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        value,
        max_age_hours * 3600
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn seal_then_open_round_trips() {
        let data = SessionData::provider("user-1", "access", "refresh");
        let sealed = seal(SECRET, &data).unwrap();
        assert_eq!(open(SECRET, &sealed), Some(data));
    }

    #[test]
    fn local_session_has_no_tokens() {
        let data = SessionData::local("user-1");
        let sealed = seal(SECRET, &data).unwrap();
        let opened = open(SECRET, &sealed).unwrap();
        assert_eq!(opened.user_id, "user-1");
        assert!(opened.access_token.is_none());
        assert!(opened.refresh_token.is_none());
    }

    #[test]
    fn tampered_payload_fails_to_open() {
        let sealed = seal(SECRET, &SessionData::local("user-1")).unwrap();
        let (payload, tag) = sealed.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":"admin"}"#);
        let forged = format!("{}.{}", forged_payload, tag);
        assert_ne!(payload, forged_payload);
        assert_eq!(open(SECRET, &forged), None);
    }

    #[test]
    fn wrong_secret_fails_to_open() {
        let sealed = seal(SECRET, &SessionData::local("user-1")).unwrap();
        assert_eq!(open("other-secret", &sealed), None);
    }

    #[test]
    fn garbage_fails_to_open() {
        assert_eq!(open(SECRET, ""), None);
        assert_eq!(open(SECRET, "not-a-cookie"), None);
        assert_eq!(open(SECRET, "a.b"), None);
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let c = clear_cookie("cartophile_session");
        assert!(c.contains("Max-Age=0"));
        assert!(c.starts_with("cartophile_session=;"));
    }
}
