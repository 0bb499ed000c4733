//! TOTP endpoints. All of them require a valid bearer token; the claims
//! subject is the TOTP username.

use axum::{Json, extract::Extension};

use crate::totp::TotpService;

use super::error::AuthError;
use super::extract::Auth;
use super::types::{EmptyResponse, TotpCodeRequest, TotpSetupResponse};

#[utoipa::path(
    post,
    path = "/api/totp/setup",
    responses(
        (status = 200, description = "Enrollment material; shown exactly once", body = TotpSetupResponse),
        (status = 409, description = "TOTP already enrolled", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "totp"
)]
pub async fn totp_setup(
    Auth(claims): Auth,
    service: Extension<TotpService>,
) -> Result<Json<TotpSetupResponse>, AuthError> {
    let setup = service.generate_setup(&claims.sub)?;
    service.store_setup(&claims.sub, &setup).await?;

    Ok(Json(TotpSetupResponse {
        secret: setup.secret,
        qr_code_url: setup.qr_url,
        manual_entry: setup.manual_entry,
        backup_codes: setup.backup_codes,
    }))
}

#[utoipa::path(
    post,
    path = "/api/totp/complete",
    request_body = TotpCodeRequest,
    responses(
        (status = 200, description = "TOTP enabled", body = EmptyResponse),
        (status = 400, description = "Invalid code", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "totp"
)]
pub async fn totp_complete(
    Auth(claims): Auth,
    service: Extension<TotpService>,
    payload: Option<Json<TotpCodeRequest>>,
) -> Result<Json<EmptyResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };
    service.complete_setup(&claims.sub, request.code.trim()).await?;
    Ok(Json(EmptyResponse::default()))
}

#[utoipa::path(
    post,
    path = "/api/totp/validate",
    request_body = TotpCodeRequest,
    responses(
        (status = 200, description = "Code accepted", body = EmptyResponse),
        (status = 400, description = "Invalid code", body = super::error::ErrorBody),
        (status = 429, description = "Code replay detected", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "totp"
)]
pub async fn totp_validate(
    Auth(claims): Auth,
    service: Extension<TotpService>,
    payload: Option<Json<TotpCodeRequest>>,
) -> Result<Json<EmptyResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };
    let code = request.code.trim();
    if request.is_backup {
        service.validate_backup(&claims.sub, code).await?;
    } else {
        service.validate_code(&claims.sub, code).await?;
    }
    Ok(Json(EmptyResponse::default()))
}

#[utoipa::path(
    post,
    path = "/api/totp/disable",
    request_body = TotpCodeRequest,
    responses(
        (status = 200, description = "TOTP disabled, usage logs cleared", body = EmptyResponse),
        (status = 400, description = "Invalid code", body = super::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "totp"
)]
pub async fn totp_disable(
    Auth(claims): Auth,
    service: Extension<TotpService>,
    payload: Option<Json<TotpCodeRequest>>,
) -> Result<Json<EmptyResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };
    // Backup codes cannot disable TOTP; a stolen recovery code must not be
    // enough to strip the second factor.
    if request.is_backup {
        return Err(AuthError::InvalidCode);
    }
    service.disable(&claims.sub, request.code.trim()).await?;
    Ok(Json(EmptyResponse::default()))
}
