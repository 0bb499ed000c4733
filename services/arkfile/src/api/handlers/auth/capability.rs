//! Device-capability negotiation.
//!
//! The capability names the Argon2 cost profile the client should use for
//! its `OPAQUE` key-stretching function. The server recommends one from the
//! declared hardware; clients may settle lower, but moving above the
//! recommendation requires explicit consent at registration time.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::AuthError;
use super::types::{CapabilityRequest, CapabilityResponse};

#[derive(
    ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCapability {
    Minimal,
    Interactive,
    Balanced,
    Maximum,
}

impl DeviceCapability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Interactive => "interactive",
            Self::Balanced => "balanced",
            Self::Maximum => "maximum",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Minimal => "Lowest memory profile for constrained devices; login stays fast.",
            Self::Interactive => "Light profile tuned for responsive logins on everyday hardware.",
            Self::Balanced => "Default profile balancing stretch cost and login latency.",
            Self::Maximum => "Highest stretch cost; recommended only for fast desktop hardware.",
        }
    }
}

/// Recommend a capability from declared hardware. Mobile devices cap out at
/// `balanced`: battery and thermal budgets make the maximum profile hostile
/// there regardless of RAM.
#[must_use]
pub fn recommend(memory_gb: f64, cpu_cores: u32, is_mobile: bool) -> DeviceCapability {
    if memory_gb < 2.0 {
        return DeviceCapability::Minimal;
    }
    if memory_gb < 4.0 {
        return DeviceCapability::Interactive;
    }
    if is_mobile || memory_gb < 8.0 || cpu_cores < 4 {
        return DeviceCapability::Balanced;
    }
    DeviceCapability::Maximum
}

#[utoipa::path(
    post,
    path = "/api/opaque/capability",
    request_body = CapabilityRequest,
    responses(
        (status = 200, description = "Capability recommendation", body = CapabilityResponse),
        (status = 400, description = "Malformed request", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn capability(
    payload: Option<Json<CapabilityRequest>>,
) -> Result<Json<CapabilityResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Malformed);
    };
    if !request.memory_gb.is_finite() || request.memory_gb < 0.0 {
        return Err(AuthError::Malformed);
    }

    let recommended = recommend(request.memory_gb, request.cpu_cores, request.is_mobile);
    Ok(Json(CapabilityResponse {
        recommended_capability: recommended,
        description: recommended.description().to_string(),
        source: "server-recommended".to_string(),
    }))
}
