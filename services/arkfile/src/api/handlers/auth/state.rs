//! Auth configuration and shared state.

use arkfile_token::KeyRing;

use crate::opaque::OpaqueEngine;

const DEFAULT_OPAQUE_SERVER_ID: &str = "api.arkfile.dev";
const DEFAULT_TOTP_ISSUER: &str = "Arkfile";
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    opaque_server_id: String,
    totp_issuer: String,
    refresh_ttl_seconds: i64,
    cleanup_interval_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            opaque_server_id: DEFAULT_OPAQUE_SERVER_ID.to_string(),
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            cleanup_interval_seconds: DEFAULT_CLEANUP_INTERVAL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_opaque_server_id(mut self, server_id: String) -> Self {
        self.opaque_server_id = server_id;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cleanup_interval_seconds(mut self, seconds: u64) -> Self {
        self.cleanup_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn opaque_server_id(&self) -> &str {
        &self.opaque_server_id
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn cleanup_interval_seconds(&self) -> u64 {
        self.cleanup_interval_seconds
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared auth state: configuration, the PAKE engine, and the signing-key
/// ring. Built once at startup, never mutated.
pub struct AuthState {
    config: AuthConfig,
    engine: OpaqueEngine,
    token_ring: KeyRing,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, engine: OpaqueEngine, token_ring: KeyRing) -> Self {
        Self {
            config,
            engine,
            token_ring,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &OpaqueEngine {
        &self.engine
    }

    #[must_use]
    pub fn token_ring(&self) -> &KeyRing {
        &self.token_ring
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::opaque::OpaqueEngine;
    use anyhow::Result;
    use arkfile_token::{KeyRing, SigningKey};

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.opaque_server_id(), super::DEFAULT_OPAQUE_SERVER_ID);
        assert_eq!(config.totp_issuer(), super::DEFAULT_TOTP_ISSUER);
        assert_eq!(
            config.refresh_ttl_seconds(),
            super::DEFAULT_REFRESH_TTL_SECONDS
        );

        let config = config
            .with_opaque_server_id("auth.test".to_string())
            .with_totp_issuer("Test".to_string())
            .with_refresh_ttl_seconds(60)
            .with_cleanup_interval_seconds(5);
        assert_eq!(config.opaque_server_id(), "auth.test");
        assert_eq!(config.totp_issuer(), "Test");
        assert_eq!(config.refresh_ttl_seconds(), 60);
        assert_eq!(config.cleanup_interval_seconds(), 5);
    }

    #[test]
    fn state_exposes_engine_identity() -> Result<()> {
        let config = AuthConfig::new().with_opaque_server_id("auth.test".to_string());
        let engine = OpaqueEngine::from_seed([7u8; 32], config.opaque_server_id().to_string());
        let ring = KeyRing::new(SigningKey::new(vec![1u8; 32])?);
        let state = AuthState::new(config, engine, ring);
        assert_eq!(state.engine().server_id(), b"auth.test");
        Ok(())
    }
}
