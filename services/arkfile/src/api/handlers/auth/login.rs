//! `OPAQUE` login endpoint.

use arkfile_token::AccessClaims;
use axum::{Json, extract::Extension};
use sqlx::PgPool;
use std::sync::Arc;

use crate::opaque::SessionKey;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{USER_STATUS_APPROVED, insert_refresh_token, lookup_login_record};
use super::types::{LoginRequest, LoginResponse};
use super::utils::{normalize_email, valid_email};

#[utoipa::path(
    post,
    path = "/api/opaque/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = super::error::ErrorBody),
        (status = 403, description = "Account pending approval", body = super::error::ErrorBody),
        (status = 503, description = "Authentication unavailable", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Malformed);
    }

    let record = lookup_login_record(&pool, &email).await?;
    let (status, opaque_record) = match record {
        Some(record) => (Some(record.status), Some(record.opaque_record)),
        None => (None, None),
    };

    // The exchange runs for unknown accounts too (against a dummy flow), so
    // response shape and timing match a wrong password exactly.
    let state = auth_state.0.clone();
    let exchange_email = email.clone();
    let password = request.password;
    let export_key = tokio::task::spawn_blocking(move || {
        state
            .engine()
            .login(&exchange_email, password.as_bytes(), opaque_record.as_deref())
    })
    .await
    .map_err(|err| AuthError::Store(anyhow::anyhow!("login task failed: {err}")))??;

    // Approval is checked only after the exchange authenticated the caller.
    match status.as_deref() {
        Some(USER_STATUS_APPROVED) => {}
        Some(_) => return Err(AuthError::NotApproved),
        None => return Err(AuthError::BadCredentials),
    }

    let claims = AccessClaims::new(email.as_str());
    let token = arkfile_token::sign(&claims, auth_state.token_ring())?;
    let refresh_token =
        insert_refresh_token(&pool, &email, auth_state.config().refresh_ttl_seconds()).await?;

    // The session key lives exactly as long as the access token; the server
    // hands it out once and keeps nothing.
    let session_key = SessionKey::derive(&export_key);

    Ok(Json(LoginResponse {
        token,
        refresh_token,
        session_key: session_key.to_base64(),
        auth_method: "OPAQUE".to_string(),
    }))
}
