//! TOTP master key and per-user key derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

/// Domain separator for per-user TOTP encryption keys. Changing this value
/// orphans every stored TOTP secret.
const DERIVE_SALT: &[u8] = b"arkfile-totp-v1";

/// Process-wide TOTP master key. Never logged, never persisted outside the
/// initial key-file write, never sent over the wire.
#[derive(Clone, ZeroizeOnDrop)]
pub struct TotpMasterKey([u8; 32]);

impl TotpMasterKey {
    #[must_use]
    pub(crate) fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the per-user TOTP encryption key.
    ///
    /// Deterministic: HKDF-SHA256 over the master key with
    /// salt = `"arkfile-totp-v1"` and info = username. Equal usernames yield
    /// equal keys; distinct usernames yield independent keys.
    #[must_use]
    pub fn derive_user_key(&self, username: &str) -> TotpUserKey {
        let hk = Hkdf::<Sha256>::new(Some(DERIVE_SALT), &self.0);
        let mut okm = [0u8; 32];
        hk.expand(username.as_bytes(), &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        TotpUserKey(okm)
    }
}

/// A derived per-user key. Lives for the span of one operation and is wiped
/// on every exit path, including errors, by the drop impl.
#[derive(ZeroizeOnDrop)]
pub struct TotpUserKey([u8; 32]);

impl TotpUserKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::TotpMasterKey;

    #[test]
    fn derivation_is_deterministic() {
        let master = TotpMasterKey::new([9u8; 32]);
        let first = master.derive_user_key("alice");
        let second = master.derive_user_key("alice");
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.as_bytes().len(), 32);
    }

    #[test]
    fn distinct_users_get_distinct_keys() {
        let master = TotpMasterKey::new([9u8; 32]);
        let alice = master.derive_user_key("alice");
        let bob = master.derive_user_key("bob");
        assert_ne!(alice.as_bytes(), bob.as_bytes());
    }

    #[test]
    fn derived_key_is_not_the_master_key() {
        let master_bytes = [9u8; 32];
        let master = TotpMasterKey::new(master_bytes);
        assert_ne!(master.derive_user_key("alice").as_bytes(), master_bytes);
    }

    #[test]
    fn distinct_masters_diverge() {
        let one = TotpMasterKey::new([1u8; 32]);
        let two = TotpMasterKey::new([2u8; 32]);
        assert_ne!(
            one.derive_user_key("alice").as_bytes(),
            two.derive_user_key("alice").as_bytes()
        );
    }
}
