//! Session-key binding.
//!
//! On a successful login both sides hold the `OPAQUE` export key; the
//! session key is a domain-separated derivation of it. The server returns
//! the key once, base64-encoded in the login response, and never persists
//! it; its logical lifetime is the access token's `exp`.

use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use super::engine::ExportKey;

const SESSION_KEY_INFO: &[u8] = b"arkfile-session-v1";
const SESSION_KEY_LEN: usize = 32;

/// Symmetric secret for account-password-protected file encryption.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Derive the session key from PAKE export material.
    #[must_use]
    pub fn derive(export_key: &ExportKey) -> Self {
        let hk = Hkdf::<Sha256>::new(None, export_key.as_bytes());
        let mut okm = [0u8; SESSION_KEY_LEN];
        hk.expand(SESSION_KEY_INFO, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        Self(okm)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64, the encoding the login response uses.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }
}
