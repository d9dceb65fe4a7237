//! HS256 JSON Web Tokens.
//!
//! Only the compact serialization with `alg = HS256` is supported. Tokens are
//! issued by the `/token` endpoint and checked by [`BearerJwtGate`].
//!
//! [`BearerJwtGate`]: crate::security::auth::BearerJwtGate

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::security::auth::AuthError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Registered claims understood by the gate. Unknown claims are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// A freshly signed token, serialized as the `/token` response.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a token for `sub` valid for `ttl` from `now`.
pub fn issue(secret: &[u8], sub: &str, ttl: Duration, now: DateTime<Utc>) -> IssuedToken {
    let expires_at = now + ttl;
    let claims = Claims {
        sub: Some(sub.to_string()),
        exp: Some(expires_at.timestamp()),
        nbf: None,
        iat: Some(now.timestamp()),
    };
    let header = Header {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };

    let signing_input = format!("{}.{}", encode_part(&header), encode_part(&claims));
    let signature = URL_SAFE_NO_PAD.encode(sign(secret, signing_input.as_bytes()));

    IssuedToken {
        token: format!("{signing_input}.{signature}"),
        expires_at,
    }
}

/// Verify signature and time claims, returning the claims on success.
pub fn verify(secret: &[u8], token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed("expected three dot-separated parts"));
    };

    let header: Header = decode_part(header_b64)?;
    if header.alg != "HS256" {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::Malformed("signature is not base64url"))?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    // Constant-time comparison
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims: Claims = decode_part(claims_b64)?;
    let now = now.timestamp();
    if claims.exp.is_some_and(|exp| exp <= now) {
        return Err(AuthError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now) {
        return Err(AuthError::NotYetValid);
    }

    Ok(claims)
}

fn sign(secret: &[u8], input: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(input);
    mac.finalize().into_bytes().to_vec()
}

fn encode_part<T: Serialize>(value: &T) -> String {
    // Serializing these plain structs cannot fail.
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| AuthError::Malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed("segment is not valid JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_issue_then_verify() {
        let now = Utc::now();
        let issued = issue(SECRET, "alice", Duration::hours(1), now);
        assert_eq!(issued.token.matches('.').count(), 2);

        let claims = verify(SECRET, &issued.token, now).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("alice"));
        assert_eq!(claims.exp, Some(issued.expires_at.timestamp()));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let issued = issue(SECRET, "alice", Duration::hours(1), now);
        assert_eq!(verify(b"other", &issued.token, now), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let now = Utc::now();
        let issued = issue(SECRET, "alice", Duration::hours(1), now);
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged = encode_part(&Claims {
            sub: Some("mallory".into()),
            ..Claims::default()
        });
        parts[1] = &forged;
        assert_eq!(verify(SECRET, &parts.join("."), now), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_expired_rejected() {
        let then = Utc::now() - Duration::hours(2);
        let issued = issue(SECRET, "alice", Duration::hours(1), then);
        assert_eq!(verify(SECRET, &issued.token, Utc::now()), Err(AuthError::Expired));
    }

    #[test]
    fn test_malformed_and_unsupported() {
        let now = Utc::now();
        assert!(matches!(verify(SECRET, "abc", now), Err(AuthError::Malformed(_))));
        assert!(matches!(verify(SECRET, "a.b.c.d", now), Err(AuthError::Malformed(_))));

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let claims = encode_part(&Claims::default());
        let token = format!("{none_header}.{claims}.");
        assert_eq!(
            verify(SECRET, &token, now),
            Err(AuthError::UnsupportedAlgorithm("none".into()))
        );
    }
}
