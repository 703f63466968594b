//! Login sessions for the workspace view.
//!
//! The remote service authenticates the user; this module only remembers
//! the resulting `user_id` in an HMAC-signed cookie so the workspace can be
//! handed an explicit `SessionContext`.

use axum_extra::extract::CookieJar;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name
pub const SESSION_COOKIE: &str = "ismart_session";

/// Session time-to-live in hours
pub const SESSION_TTL_HOURS: i64 = 24;

// ============================================================================
// Session Structure
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    user_id: i64,
    created: i64,
    expires: i64,
    nonce: String,
}

// ============================================================================
// Session Functions
// ============================================================================

/// Random signing key for processes started without `ISMART_SESSION_SECRET`.
pub fn generate_secret() -> Vec<u8> {
    let mut key = vec![0u8; 32];
    rand::thread_rng().fill(&mut key[..]);
    key
}

/// Create a signed session token for `user_id`.
pub fn create_session(secret: &[u8], user_id: i64) -> Option<String> {
    let now = Utc::now().timestamp();
    let expires = now + (SESSION_TTL_HOURS * 3600);
    let nonce: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();

    let session = Session {
        user_id,
        created: now,
        expires,
        nonce,
    };
    let session_json = serde_json::to_string(&session).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(session_json.as_bytes());
    let signature = hex_encode(mac.finalize().into_bytes().as_slice());

    Some(format!("{}.{}", base64_encode(&session_json), signature))
}

/// Verify a session token and return its user id.
pub fn verify_session(token: &str, secret: &[u8]) -> Option<i64> {
    let (payload, signature) = token.split_once('.')?;
    let session_json = base64_decode(payload)?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(session_json.as_bytes());
    let expected_sig = hex_encode(mac.finalize().into_bytes().as_slice());

    // Constant-time comparison
    let sig_bytes = signature.as_bytes();
    let expected_bytes = expected_sig.as_bytes();
    if sig_bytes.len() != expected_bytes.len() || sig_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return None;
    }

    let session: Session = serde_json::from_str(&session_json).ok()?;
    if Utc::now().timestamp() >= session.expires || session.user_id <= 0 {
        return None;
    }
    Some(session.user_id)
}

/// The logged-in user id from the request cookies, if any.
pub fn session_user(jar: &CookieJar, secret: &[u8]) -> Option<i64> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| verify_session(cookie.value(), secret))
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL_HOURS * 3600
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0", SESSION_COOKIE)
}

// ============================================================================
// Encoding Helpers
// ============================================================================

fn base64_encode(s: &str) -> String {
    STANDARD.encode(s.as_bytes())
}

fn base64_decode(s: &str) -> Option<String> {
    let bytes = STANDARD.decode(s).ok()?;
    String::from_utf8(bytes).ok()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip() {
        let secret = generate_secret();
        let token = create_session(&secret, 42).unwrap();
        assert_eq!(verify_session(&token, &secret), Some(42));
    }

    #[test]
    fn test_session_rejects_other_secret() {
        let token = create_session(b"first-secret", 42).unwrap();
        assert_eq!(verify_session(&token, b"second-secret"), None);
    }

    #[test]
    fn test_session_rejects_tampered_payload() {
        let secret = b"secret";
        let token = create_session(secret, 7).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!(
            "{}.{}",
            base64_encode(r#"{"user_id":1,"created":0,"expires":99999999999,"nonce":"x"}"#),
            sig
        );
        assert_eq!(verify_session(&forged, secret), None);
        assert_eq!(verify_session("garbage", secret), None);
    }

    #[test]
    fn test_session_rejects_anonymous_user() {
        let secret = b"secret";
        let token = create_session(secret, 0).unwrap();
        assert_eq!(verify_session(&token, secret), None);
    }
}
