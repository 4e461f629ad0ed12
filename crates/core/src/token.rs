//! Bearer token model and unverified expiry decoding
//!
//! The expiry claim is read without checking the signature. It only drives
//! proactive scheduling; the backend stays the authority on rejection.

use crate::store::StorageTier;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// A persisted bearer token with its locally decoded expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    expires_at_ms: Option<i64>,
    tier: StorageTier,
}

impl Token {
    /// Wrap a raw token read from `tier`, decoding its expiry claim
    pub fn new(raw: impl Into<String>, tier: StorageTier) -> Self {
        let raw = raw.into();
        let expires_at_ms = decode_expiry_ms(&raw);
        Self {
            raw,
            expires_at_ms,
            tier,
        }
    }

    /// The opaque token string
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expiry in milliseconds since epoch, `None` if it could not be decoded
    #[must_use]
    pub const fn expires_at_ms(&self) -> Option<i64> {
        self.expires_at_ms
    }

    /// Storage tier that owns this token
    #[must_use]
    pub const fn tier(&self) -> StorageTier {
        self.tier
    }

    /// Whether the token carries a usable expiry claim
    #[must_use]
    pub const fn is_decodable(&self) -> bool {
        self.expires_at_ms.is_some()
    }

    /// Fails closed: an undecodable token is always expired
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_none_or(|exp| exp <= now_ms)
    }

    /// Milliseconds left before expiry (negative once expired)
    #[must_use]
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.expires_at_ms.map(|exp| exp - now_ms)
    }
}

/// Decode the `exp` claim of a three-segment token into milliseconds.
///
/// Returns `None` for anything that is not `header.payload.signature` with a
/// base64url JSON payload carrying a numeric `exp` (seconds since epoch).
#[must_use]
pub fn decode_expiry_ms(raw: &str) -> Option<i64> {
    let mut segments = raw.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.as_object()?.get("exp")?.as_f64()?;
    if !exp.is_finite() {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    Some((exp * 1000.0) as i64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token around an arbitrary JSON payload
    pub(crate) fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload);
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    pub(crate) fn token_expiring_at(exp_secs: i64) -> String {
        token_with_payload(&format!(r#"{{"sub":"user-1","exp":{exp_secs}}}"#))
    }

    #[test]
    fn test_decodes_exp_into_millis() {
        let raw = token_expiring_at(1_700_000_000);
        assert_eq!(decode_expiry_ms(&raw), Some(1_700_000_000_000));
    }

    #[test]
    fn test_fractional_exp_is_accepted() {
        let raw = token_with_payload(r#"{"exp":1700000000.5}"#);
        assert_eq!(decode_expiry_ms(&raw), Some(1_700_000_000_500));
    }

    #[test]
    fn test_padded_payload_is_tolerated() {
        let header = URL_SAFE_NO_PAD.encode("{}");
        let body = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":10}"#);
        let raw = format!("{header}.{body}.sig");
        assert_eq!(decode_expiry_ms(&raw), Some(10_000));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let bad = [
            String::new(),
            "not-a-token".to_string(),
            "only.two".to_string(),
            "a.b.c.d".to_string(),
            "header.!!!not-base64!!!.sig".to_string(),
            format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json")),
            token_with_payload(r#"{"sub":"no-exp"}"#),
            token_with_payload(r#"{"exp":"1700000000"}"#),
            token_with_payload(r#"{"exp":null}"#),
            token_with_payload(r#"{"exp":true}"#),
            token_with_payload("[1700000000]"),
            token_with_payload("1700000000"),
        ];

        for raw in &bad {
            assert_eq!(decode_expiry_ms(raw), None, "expected no expiry for {raw:?}");
            let token = Token::new(raw.clone(), StorageTier::Durable);
            assert!(token.is_expired(0), "{raw:?} must be treated as expired");
        }
    }

    #[test]
    fn test_expiry_comparison() {
        let token = Token::new(token_expiring_at(100), StorageTier::PerTab);
        assert!(!token.is_expired(99_999));
        assert!(token.is_expired(100_000));
        assert!(token.is_expired(100_001));
        assert_eq!(token.remaining_ms(40_000), Some(60_000));
        assert_eq!(token.tier(), StorageTier::PerTab);
    }
}
