//! The auth error taxonomy and its HTTP projection.
//!
//! Responses carry a stable machine-readable code and a fixed message.
//! Nothing in the body or status distinguishes "unknown account" from
//! "wrong password", and store failures never leak their cause.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::opaque::PakeError;
use crate::totp::TotpError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    BadCredentials,
    #[error("already exists")]
    AlreadyExists,
    #[error("account pending approval")]
    NotApproved,
    #[error("invalid code")]
    InvalidCode,
    #[error("code already used")]
    ReplayDetected,
    #[error("authentication protocol failure")]
    Protocol,
    #[error("authentication unavailable")]
    PakeUnavailable,
    #[error("malformed request")]
    Malformed,
    #[error(transparent)]
    Token(#[from] arkfile_token::Error),
    #[error("store error")]
    Store(#[source] anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadCredentials | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::NotApproved => StatusCode::FORBIDDEN,
            Self::InvalidCode | Self::Protocol | Self::Malformed => StatusCode::BAD_REQUEST,
            Self::ReplayDetected => StatusCode::TOO_MANY_REQUESTS,
            Self::PakeUnavailable | Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadCredentials => "BadCredentials",
            Self::AlreadyExists => "AlreadyExists",
            Self::NotApproved => "NotApproved",
            Self::InvalidCode => "InvalidCode",
            Self::ReplayDetected => "ReplayDetected",
            Self::Protocol => "ProtocolError",
            Self::PakeUnavailable => "PakeUnavailable",
            Self::Malformed => "Malformed",
            Self::Token(err) => err.code(),
            Self::Store(_) => "StoreError",
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Store(source) = &self {
            error!("store error: {source:#}");
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<PakeError> for AuthError {
    fn from(err: PakeError) -> Self {
        match err {
            PakeError::BadCredentials => Self::BadCredentials,
            PakeError::Protocol => Self::Protocol,
        }
    }
}

impl From<TotpError> for AuthError {
    fn from(err: TotpError) -> Self {
        match err {
            TotpError::AlreadyEnrolled => Self::AlreadyExists,
            TotpError::NotEnrolled | TotpError::NotEnabled | TotpError::InvalidCode => {
                Self::InvalidCode
            }
            TotpError::ReplayDetected => Self::ReplayDetected,
            TotpError::Store(source) => Self::Store(source),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use crate::opaque::PakeError;
    use crate::totp::TotpError;
    use axum::http::StatusCode;

    #[test]
    fn statuses_match_the_wire_contract() {
        assert_eq!(AuthError::BadCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::NotApproved.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::ReplayDetected.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::PakeUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AuthError::Token(arkfile_token::Error::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn pake_errors_map_without_detail() {
        assert!(matches!(
            AuthError::from(PakeError::BadCredentials),
            AuthError::BadCredentials
        ));
        assert!(matches!(
            AuthError::from(PakeError::Protocol),
            AuthError::Protocol
        ));
    }

    #[test]
    fn totp_errors_collapse_enrollment_state() {
        assert!(matches!(
            AuthError::from(TotpError::NotEnrolled),
            AuthError::InvalidCode
        ));
        assert!(matches!(
            AuthError::from(TotpError::NotEnabled),
            AuthError::InvalidCode
        ));
        assert!(matches!(
            AuthError::from(TotpError::AlreadyEnrolled),
            AuthError::AlreadyExists
        ));
    }

    #[test]
    fn token_errors_keep_their_wire_code() {
        let err = AuthError::Token(arkfile_token::Error::BadSignature);
        assert_eq!(err.code(), "BadSignature");
        let err = AuthError::Token(arkfile_token::Error::UnknownKid("k".to_string()));
        assert_eq!(err.code(), "Malformed");
    }
}
