//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::capability::DeviceCapability;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_capability: Option<DeviceCapability>,
    /// Required when asking for `maximum`; upward overrides need consent.
    #[serde(default)]
    pub consent_to_maximum: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub auth_method: String,
    pub user_status: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    /// Base64 of the 32-byte session key; never persisted server-side.
    pub session_key: String,
    pub auth_method: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    #[serde(rename = "memoryGB")]
    pub memory_gb: f64,
    pub cpu_cores: u32,
    pub is_mobile: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityResponse {
    pub recommended_capability: DeviceCapability,
    pub description: String,
    pub source: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TotpSetupResponse {
    pub secret: String,
    #[serde(rename = "qrCodeURL")]
    pub qr_code_url: String,
    pub manual_entry: String,
    pub backup_codes: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TotpCodeRequest {
    pub code: String,
    /// Present a backup code instead of a live TOTP code. Only honored by
    /// `/api/totp/validate`; disable always requires a live code.
    #[serde(default)]
    pub is_backup: bool,
}

/// Empty JSON object for endpoints whose success carries no data.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct EmptyResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_uses_camel_case() -> Result<()> {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "user@example.com",
            "password": "CorrectHorse!2Battery",
            "deviceCapability": "balanced"
        }))?;
        assert_eq!(request.email, "user@example.com");
        assert_eq!(
            request.device_capability,
            Some(super::DeviceCapability::Balanced)
        );
        assert!(!request.consent_to_maximum);
        Ok(())
    }

    #[test]
    fn login_response_field_names() -> Result<()> {
        let response = LoginResponse {
            token: "t".to_string(),
            refresh_token: "r".to_string(),
            session_key: "s".to_string(),
            auth_method: "OPAQUE".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("refreshToken").is_some());
        assert!(value.get("sessionKey").is_some());
        assert!(value.get("authMethod").is_some());
        Ok(())
    }

    #[test]
    fn capability_request_accepts_spec_field_names() -> Result<()> {
        let request: CapabilityRequest = serde_json::from_value(serde_json::json!({
            "memoryGB": 7.5,
            "cpuCores": 4,
            "isMobile": true
        }))?;
        assert!((request.memory_gb - 7.5).abs() < f64::EPSILON);
        assert_eq!(request.cpu_cores, 4);
        assert!(request.is_mobile);
        Ok(())
    }

    #[test]
    fn totp_setup_response_uses_qr_code_url_name() -> Result<()> {
        let response = TotpSetupResponse {
            secret: "JBSWY3DP".to_string(),
            qr_code_url: "otpauth://totp/x".to_string(),
            manual_entry: "JBSW Y3DP".to_string(),
            backup_codes: vec!["AAAA-BBBB-CCCC".to_string()],
        };
        let value = serde_json::to_value(&response)?;
        let url = value
            .get("qrCodeURL")
            .and_then(serde_json::Value::as_str)
            .context("missing qrCodeURL")?;
        assert!(url.starts_with("otpauth://"));
        Ok(())
    }

    #[test]
    fn totp_code_request_defaults_to_live_code() -> Result<()> {
        let request: TotpCodeRequest =
            serde_json::from_value(serde_json::json!({"code": "123456"}))?;
        assert!(!request.is_backup);
        Ok(())
    }
}
