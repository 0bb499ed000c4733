use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ISSUER: &str = "arkfile-auth";
pub const AUDIENCE: &str = "arkfile-api";
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Claims carried by an Arkfile access token.
///
/// `sub` is the account email. The audience is a list so additional consumers
/// can be added without changing the claim shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessClaims {
    /// Claims for a token issued now, expiring in 24 hours.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self::issued_at(email, Utc::now().timestamp())
    }

    /// Claims anchored at an explicit issue time. Used by tests to build
    /// expired or not-yet-valid tokens without sleeping.
    #[must_use]
    pub fn issued_at(email: impl Into<String>, iat: i64) -> Self {
        Self {
            sub: email.into(),
            iss: ISSUER.to_string(),
            aud: vec![AUDIENCE.to_string()],
            iat,
            nbf: iat,
            exp: iat + ACCESS_TOKEN_TTL_SECONDS,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ACCESS_TOKEN_TTL_SECONDS, AUDIENCE, AccessClaims, ISSUER};
    use anyhow::Result;

    #[test]
    fn claims_span_twenty_four_hours() {
        let claims = AccessClaims::issued_at("user@example.com", 1_700_000_000);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECONDS);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.iss, ISSUER);
        assert!(claims.aud.iter().any(|aud| aud == AUDIENCE));
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn jti_is_unique_per_token() {
        let first = AccessClaims::new("user@example.com");
        let second = AccessClaims::new("user@example.com");
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn claims_serialize_with_registered_names() -> Result<()> {
        let claims = AccessClaims::issued_at("user@example.com", 1_700_000_000);
        let value = serde_json::to_value(&claims)?;
        assert_eq!(
            value.get("sub").and_then(serde_json::Value::as_str),
            Some("user@example.com")
        );
        assert_eq!(
            value.get("iss").and_then(serde_json::Value::as_str),
            Some("arkfile-auth")
        );
        assert_eq!(
            value.get("exp").and_then(serde_json::Value::as_i64),
            Some(1_700_000_000 + ACCESS_TOKEN_TTL_SECONDS)
        );
        Ok(())
    }
}
