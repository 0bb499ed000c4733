//! Refresh-token lifecycle endpoints: rotation, logout, revoke-all.

use arkfile_token::AccessClaims;
use axum::{Json, extract::Extension};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::extract::Auth;
use super::state::AuthState;
use super::storage::{revoke_all_for_user, revoke_refresh_by_hash, rotate_refresh_token};
use super::types::{EmptyResponse, LogoutRequest, RefreshRequest, TokenPairResponse};
use super::utils::hash_refresh_token;

#[utoipa::path(
    post,
    path = "/api/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPairResponse),
        (status = 401, description = "Unknown, revoked, or expired refresh token", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };

    let presented_hash = hash_refresh_token(request.refresh_token.trim());

    // Revoke-and-mint is one transaction: a failure on either side leaves
    // the presented token valid and no replacement issued.
    let rotated = rotate_refresh_token(
        &pool,
        presented_hash,
        auth_state.config().refresh_ttl_seconds(),
    )
    .await?;

    let Some((email, refresh_token)) = rotated else {
        return Err(AuthError::Token(arkfile_token::Error::Expired));
    };

    let token = arkfile_token::sign(&AccessClaims::new(email.as_str()), auth_state.token_ring())?;
    Ok(Json(TokenPairResponse {
        token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Refresh token revoked", body = EmptyResponse),
        (status = 401, description = "Unknown or already revoked token", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(
    pool: Extension<PgPool>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<EmptyResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };

    let presented_hash = hash_refresh_token(request.refresh_token.trim());
    if !revoke_refresh_by_hash(&pool, &presented_hash).await? {
        return Err(AuthError::Token(arkfile_token::Error::Expired));
    }
    Ok(Json(EmptyResponse::default()))
}

#[utoipa::path(
    post,
    path = "/api/revoke-all",
    responses(
        (status = 200, description = "All refresh tokens revoked", body = EmptyResponse),
        (status = 401, description = "Missing or invalid bearer token", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn revoke_all(
    Auth(claims): Auth,
    pool: Extension<PgPool>,
) -> Result<Json<EmptyResponse>, AuthError> {
    // Access tokens stay valid until exp; clients are expected to drop them.
    revoke_all_for_user(&pool, &claims.sub).await?;
    Ok(Json(EmptyResponse::default()))
}

#[cfg(test)]
mod tests {
    use super::{logout, refresh};
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::test_support::auth_state;
    use anyhow::Result;
    use axum::extract::Extension;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Result<sqlx::PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn refresh_missing_payload_is_malformed() -> Result<()> {
        let result = refresh(Extension(lazy_pool()?), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }

    #[tokio::test]
    async fn logout_missing_payload_is_malformed() -> Result<()> {
        let result = logout(Extension(lazy_pool()?), None).await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }
}
