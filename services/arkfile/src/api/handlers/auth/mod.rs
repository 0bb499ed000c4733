//! Authentication handlers: `OPAQUE` registration and login, bearer-token
//! lifecycle, device-capability negotiation, and the TOTP second factor.

pub mod capability;
pub mod error;
pub mod extract;
pub mod login;
pub mod register;
pub mod state;
pub(crate) mod storage;
pub mod tokens;
pub mod totp;
pub mod types;
mod utils;


pub use state::{AuthConfig, AuthState};

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for handler tests.

    use super::state::{AuthConfig, AuthState};
    use crate::opaque::OpaqueEngine;
    use arkfile_token::{KeyRing, SigningKey};
    use std::sync::Arc;

    const TEST_SIGNING_KEY: [u8; 32] = [1u8; 32];

    pub(crate) fn signing_ring() -> KeyRing {
        let key = SigningKey::new(TEST_SIGNING_KEY.to_vec()).expect("static test key is valid");
        KeyRing::new(key)
    }

    pub(crate) fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new().with_opaque_server_id("auth.test".to_string());
        let engine = OpaqueEngine::from_seed([7u8; 32], "auth.test".to_string());
        Arc::new(AuthState::new(config, engine, signing_ring()))
    }
}
