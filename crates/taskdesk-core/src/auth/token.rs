//! Access token expiry decoding.
//!
//! Only the payload's `exp` claim is read; signatures are the server's
//! business.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Expiry timestamp embedded in a JWT access token, if any.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    // Some issuers keep the padding
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Utc.timestamp_opt(claims.exp?, 0).single()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Valid,
    ExpiringSoon,
    Expired,
}

impl ExpiryState {
    pub fn classify(expires_at: DateTime<Utc>, now: DateTime<Utc>, horizon: Duration) -> Self {
        if expires_at <= now {
            ExpiryState::Expired
        } else if expires_at - now <= horizon {
            ExpiryState::ExpiringSoon
        } else {
            ExpiryState::Valid
        }
    }

    /// Classify a raw token; `None` when it carries no readable expiry.
    pub fn of_token(token: &str, now: DateTime<Utc>, horizon: Duration) -> Option<Self> {
        expires_at(token).map(|exp| Self::classify(exp, now, horizon))
    }
}

#[cfg(test)]
pub(crate) fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":1,"exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_reads_exp_claim() {
        let token = make_token(1_700_000_000);
        let exp = expires_at(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_expires_at_rejects_garbage() {
        assert!(expires_at("").is_none());
        assert!(expires_at("opaque-token").is_none());
        assert!(expires_at("a.!!!.c").is_none());

        let no_exp = format!("x.{}.y", URL_SAFE_NO_PAD.encode(br#"{"id":1}"#));
        assert!(expires_at(&no_exp).is_none());
    }

    #[test]
    fn test_classify() {
        let now = Utc::now();
        let horizon = Duration::minutes(5);
        assert_eq!(
            ExpiryState::classify(now - Duration::seconds(1), now, horizon),
            ExpiryState::Expired
        );
        assert_eq!(
            ExpiryState::classify(now + Duration::minutes(4), now, horizon),
            ExpiryState::ExpiringSoon
        );
        assert_eq!(
            ExpiryState::classify(now + Duration::minutes(30), now, horizon),
            ExpiryState::Valid
        );
    }

    #[test]
    fn test_of_token() {
        let now = Utc::now();
        let token = make_token((now + Duration::hours(1)).timestamp());
        assert_eq!(
            ExpiryState::of_token(&token, now, Duration::minutes(5)),
            Some(ExpiryState::Valid)
        );
        assert_eq!(ExpiryState::of_token("opaque", now, Duration::minutes(5)), None);
    }
}
