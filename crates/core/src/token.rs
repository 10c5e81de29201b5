//! Stateless signed connect tokens for WebSocket handshakes.
//!
//! A connect token is a short-lived capability minted by the HTTP layer and
//! presented inside the first frame of a WebSocket connection (the
//! persistent transport has no request headers to carry credentials). The
//! wire format is a URL-safe base64 envelope of `{payload, signature}`,
//! where `signature` is HMAC-SHA256 over the canonical JSON payload bytes
//! using a server-held secret.
//!
//! Both [`issue`] and [`verify`] are pure functions over an explicit
//! [`TokenSecret`] — no hidden globals, no server-side session store. Any
//! decode failure, signature mismatch, or expiry violation verifies to
//! `None`; verification never panics or errors into caller code paths.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::{DbId, Timestamp};

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime in seconds (5 minutes).
///
/// The connection itself outlives this window; the token is single-use for
/// the handshake only.
pub const TOKEN_TTL_SECS: i64 = 300;

/// Which persistent-connection endpoint a token may authenticate.
///
/// A chat token can never authenticate the tenant notification endpoint,
/// and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Crew chat / direct messages.
    Chat,
    /// Tenant operator system notifications.
    Notify,
}

/// Claims carried by a connect token. Immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: crew member id (chat) or operator id (notify).
    pub sub: DbId,
    /// Tenant: the organization the subject belongs to.
    pub org: DbId,
    /// Endpoint this token may authenticate.
    pub aud: Audience,
    /// Expiry as a UTC Unix timestamp.
    pub exp: i64,
}

/// On-wire envelope; base64-encoded as a whole.
#[derive(Serialize, Deserialize)]
struct Envelope {
    payload: String,
    signature: String,
}

/// Server-held signing secret.
///
/// When the secret is absent, token minting degrades off ([`issue`] returns
/// `None`) and [`verify`] rejects everything. Production deployments should
/// treat a missing secret as a configuration error at startup.
#[derive(Debug, Clone)]
pub struct TokenSecret(Option<String>);

impl TokenSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Some(secret.into()))
    }

    /// A secret-less codec: issue and verify both refuse all tokens.
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Load from the `REALTIME_TOKEN_SECRET` environment variable.
    ///
    /// Absent or empty means disabled, not an error; the realtime endpoints
    /// then reject every handshake.
    pub fn from_env() -> Self {
        match std::env::var("REALTIME_TOKEN_SECRET") {
            Ok(s) if !s.is_empty() => Self(Some(s)),
            _ => Self(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

/// Sign a connect token for `(subject, tenant)` on `audience`, expiring
/// [`TOKEN_TTL_SECS`] from now.
///
/// Returns `None` when no secret is configured.
pub fn issue(secret: &TokenSecret, subject: DbId, tenant: DbId, audience: Audience) -> Option<String> {
    issue_at(secret, subject, tenant, audience, Utc::now())
}

/// Like [`issue`], with an explicit clock for deterministic tests.
pub fn issue_at(
    secret: &TokenSecret,
    subject: DbId,
    tenant: DbId,
    audience: Audience,
    now: Timestamp,
) -> Option<String> {
    let key = secret.0.as_deref()?;
    let claims = Claims {
        sub: subject,
        org: tenant,
        aud: audience,
        exp: now.timestamp() + TOKEN_TTL_SECS,
    };

    // Claims serialization is infallible for this struct; treat a failure
    // as "unavailable" all the same rather than panicking.
    let payload = serde_json::to_string(&claims).ok()?;
    let signature = sign(key, payload.as_bytes());
    let envelope = serde_json::to_string(&Envelope { payload, signature }).ok()?;

    Some(URL_SAFE_NO_PAD.encode(envelope))
}

/// Verify a connect token against the expected audience.
///
/// Recomputes the HMAC over the extracted payload, requires exact equality
/// before trusting the decoded claims, then checks `exp > now` and the
/// audience. Pure: safe to call repeatedly, no side effects.
pub fn verify(secret: &TokenSecret, token: &str, audience: Audience) -> Option<Claims> {
    verify_at(secret, token, audience, Utc::now())
}

/// Like [`verify`], with an explicit clock for deterministic tests.
pub fn verify_at(
    secret: &TokenSecret,
    token: &str,
    audience: Audience,
    now: Timestamp,
) -> Option<Claims> {
    let key = secret.0.as_deref()?;

    let envelope_bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    let envelope: Envelope = serde_json::from_slice(&envelope_bytes).ok()?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(envelope.payload.as_bytes());
    let expected = URL_SAFE_NO_PAD.decode(&envelope.signature).ok()?;
    // Constant-time comparison via the Mac trait.
    mac.verify_slice(&expected).ok()?;

    let claims: Claims = serde_json::from_str(&envelope.payload).ok()?;
    if claims.aud != audience {
        return None;
    }
    if claims.exp <= now.timestamp() {
        return None;
    }
    Some(claims)
}

fn sign(key: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_secret() -> TokenSecret {
        TokenSecret::new("test-secret-that-is-long-enough-for-hmac")
    }

    #[test]
    fn roundtrip_returns_same_claims() {
        let secret = test_secret();
        let now = Utc::now();
        let token = issue_at(&secret, 7, 9, Audience::Chat, now).expect("issue should succeed");

        let claims = verify_at(&secret, &token, Audience::Chat, now).expect("verify should succeed");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.org, 9);
        assert_eq!(claims.aud, Audience::Chat);
        assert_eq!(claims.exp, now.timestamp() + TOKEN_TTL_SECS);
    }

    #[test]
    fn expired_token_is_invalid() {
        let secret = test_secret();
        let now = Utc::now();
        let token = issue_at(&secret, 1, 1, Audience::Chat, now).unwrap();

        // Scenario: 5-minute lifetime, verified 6 minutes later.
        let later = now + Duration::minutes(6);
        assert!(verify_at(&secret, &token, Audience::Chat, later).is_none());

        // Still valid just inside the window.
        let sooner = now + Duration::minutes(4);
        assert!(verify_at(&secret, &token, Audience::Chat, sooner).is_some());
    }

    #[test]
    fn tampered_token_is_invalid() {
        let secret = test_secret();
        let now = Utc::now();
        let token = issue_at(&secret, 1, 2, Audience::Chat, now).unwrap();

        // Flip one character anywhere in the encoded envelope.
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(verify_at(&secret, &tampered, Audience::Chat, now).is_none());
    }

    #[test]
    fn resigned_payload_with_wrong_secret_is_invalid() {
        let now = Utc::now();
        let token = issue_at(&TokenSecret::new("secret-alpha"), 1, 2, Audience::Chat, now).unwrap();
        assert!(verify_at(&TokenSecret::new("secret-bravo"), &token, Audience::Chat, now).is_none());
    }

    #[test]
    fn wrong_audience_is_invalid() {
        let secret = test_secret();
        let now = Utc::now();
        let token = issue_at(&secret, 1, 2, Audience::Chat, now).unwrap();
        assert!(verify_at(&secret, &token, Audience::Notify, now).is_none());
    }

    #[test]
    fn garbage_input_is_invalid() {
        let secret = test_secret();
        let now = Utc::now();
        assert!(verify_at(&secret, "", Audience::Chat, now).is_none());
        assert!(verify_at(&secret, "not-a-token", Audience::Chat, now).is_none());
        assert!(verify_at(&secret, "e30", Audience::Chat, now).is_none()); // b64 of "{}"
    }

    #[test]
    fn disabled_secret_degrades_off() {
        let secret = TokenSecret::disabled();
        let now = Utc::now();
        assert!(issue_at(&secret, 1, 2, Audience::Chat, now).is_none());

        let real = test_secret();
        let token = issue_at(&real, 1, 2, Audience::Chat, now).unwrap();
        assert!(verify_at(&secret, &token, Audience::Chat, now).is_none());
    }

    #[test]
    fn verify_is_repeatable() {
        let secret = test_secret();
        let now = Utc::now();
        let token = issue_at(&secret, 3, 4, Audience::Notify, now).unwrap();

        let first = verify_at(&secret, &token, Audience::Notify, now).unwrap();
        let second = verify_at(&secret, &token, Audience::Notify, now).unwrap();
        assert_eq!(first, second);
    }
}
