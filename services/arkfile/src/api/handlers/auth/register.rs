//! `OPAQUE` registration endpoint.
//!
//! The password arrives in the request body over TLS and the handler drives
//! both protocol roles in-process; only the finished registration record is
//! persisted, so a stored-record compromise never yields the password or an
//! offline-attackable equivalent.

use axum::{Json, extract::Extension, http::StatusCode};
use sqlx::PgPool;
use std::sync::Arc;

use super::capability::DeviceCapability;
use super::error::AuthError;
use super::state::AuthState;
use super::storage::{RegisterOutcome, insert_user};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{normalize_email, valid_email, valid_password};

#[utoipa::path(
    post,
    path = "/api/opaque/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account registered, pending approval", body = RegisterResponse),
        (status = 400, description = "Malformed request", body = super::error::ErrorBody),
        (status = 409, description = "Identifier already registered", body = super::error::ErrorBody),
        (status = 503, description = "Authentication unavailable", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Malformed);
    }
    if !valid_password(&request.password) {
        return Err(AuthError::Malformed);
    }
    // Upward capability overrides need explicit consent.
    if request.device_capability == Some(DeviceCapability::Maximum) && !request.consent_to_maximum {
        return Err(AuthError::Malformed);
    }

    // The key-stretching function makes this CPU-bound; keep it off the
    // async workers.
    let state = auth_state.0.clone();
    let exchange_email = email.clone();
    let password = request.password;
    let (record, _export_key) = tokio::task::spawn_blocking(move || {
        state.engine().register(&exchange_email, password.as_bytes())
    })
    .await
    .map_err(|err| AuthError::Store(anyhow::anyhow!("registration task failed: {err}")))??;

    let capability = request.device_capability.map(DeviceCapability::as_str);
    match insert_user(&pool, &email, &record, capability).await? {
        RegisterOutcome::Created => Ok((
            StatusCode::OK,
            Json(RegisterResponse {
                auth_method: "OPAQUE".to_string(),
                user_status: "pending".to_string(),
            }),
        )),
        RegisterOutcome::Conflict => Err(AuthError::AlreadyExists),
    }
}

#[cfg(test)]
mod tests {
    use super::register;
    use crate::api::handlers::auth::capability::DeviceCapability;
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::test_support::auth_state;
    use crate::api::handlers::auth::types::RegisterRequest;
    use anyhow::Result;
    use axum::{Json, extract::Extension};
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Result<sqlx::PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn missing_payload_is_malformed() -> Result<()> {
        let result = register(Extension(lazy_pool()?), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_email_is_malformed() -> Result<()> {
        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "CorrectHorse!2Battery".to_string(),
            device_capability: None,
            consent_to_maximum: false,
        };
        let result = register(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(request)),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }

    #[tokio::test]
    async fn short_password_is_malformed() -> Result<()> {
        let request = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
            device_capability: None,
            consent_to_maximum: false,
        };
        let result = register(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(request)),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }

    #[tokio::test]
    async fn maximum_capability_requires_consent() -> Result<()> {
        let request = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "CorrectHorse!2Battery".to_string(),
            device_capability: Some(DeviceCapability::Maximum),
            consent_to_maximum: false,
        };
        let result = register(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(request)),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Malformed)));
        Ok(())
    }
}
