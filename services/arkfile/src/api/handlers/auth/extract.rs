//! Bearer-token extractor.
//!
//! Guarded handlers take [`Auth`] as an argument; the extractor pulls the
//! `Authorization: Bearer` header, verifies the compact JWS against the
//! signing-key ring, and hands the claims to the handler. Failures respond
//! 401 with a code distinguishing `MissingToken`, `Malformed`, `Expired`,
//! and `BadSignature`.

use arkfile_token::AccessClaims;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;

pub struct Auth(pub AccessClaims);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("auth state not configured")))?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::Token(arkfile_token::Error::MissingToken))?
            .to_str()
            .map_err(|_| AuthError::Token(arkfile_token::Error::Malformed))?;

        let trimmed = header.trim();
        let token = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Token(arkfile_token::Error::Malformed))?;

        let claims = arkfile_token::verify(token, auth_state.token_ring())?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::Auth;
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::test_support::{auth_state, signing_ring};
    use anyhow::Result;
    use arkfile_token::AccessClaims;
    use axum::extract::FromRequestParts;
    use axum::http::{Request, request::Parts};

    fn parts_with_auth(header: Option<&str>) -> Result<Parts> {
        let mut builder = Request::builder().uri("/api/totp/setup");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        let (mut parts, ()) = builder.body(())?.into_parts();
        parts.extensions.insert(auth_state());
        Ok(parts)
    }

    #[tokio::test]
    async fn missing_header_is_missing_token() -> Result<()> {
        let mut parts = parts_with_auth(None)?;
        let rejection = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(
            rejection,
            Err(AuthError::Token(arkfile_token::Error::MissingToken))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn non_bearer_header_is_malformed() -> Result<()> {
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"))?;
        let rejection = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(
            rejection,
            Err(AuthError::Token(arkfile_token::Error::Malformed))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() -> Result<()> {
        let mut parts = parts_with_auth(Some("Bearer not.a.jwt"))?;
        let rejection = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(
            rejection,
            Err(AuthError::Token(arkfile_token::Error::Malformed))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn valid_token_yields_claims() -> Result<()> {
        let claims = AccessClaims::new("alice@example.com");
        let token = arkfile_token::sign(&claims, &signing_ring())?;

        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")))?;
        let Auth(extracted) = Auth::from_request_parts(&mut parts, &())
            .await
            .map_err(|err| anyhow::anyhow!("extract failed: {err}"))?;
        assert_eq!(extracted.sub, "alice@example.com");
        Ok(())
    }

    #[tokio::test]
    async fn tampered_token_is_bad_signature() -> Result<()> {
        let claims = AccessClaims::new("alice@example.com");
        let token = arkfile_token::sign(&claims, &signing_ring())?;
        // Flip the first signature character; still canonical base64url.
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let sig = parts[2].clone();
        let flipped = if sig.starts_with('A') { 'B' } else { 'A' };
        parts[2] = format!("{}{}", flipped, &sig[1..]);
        let tampered = parts.join(".");

        let mut parts = parts_with_auth(Some(&format!("Bearer {tampered}")))?;
        let rejection = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(
            rejection,
            Err(AuthError::Token(arkfile_token::Error::BadSignature))
        ));
        Ok(())
    }
}
