//! AEAD sealing for per-user TOTP state.
//!
//! Layout is `nonce (12 bytes) || ciphertext`. The AAD binds each blob to
//! the owning username and to what the blob is (secret vs backup set), so a
//! row swapped between users or columns fails to open.

use anyhow::Result;
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};

/// What a sealed blob holds; part of the AAD.
#[derive(Debug, Clone, Copy)]
pub enum BlobKind {
    Secret,
    BackupCodes,
}

impl BlobKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::BackupCodes => "backup",
        }
    }
}

/// Encrypt `plaintext` under the per-user key.
///
/// # Errors
/// Returns an error if encryption fails.
#[allow(deprecated)]
pub fn seal(key: &[u8], plaintext: &[u8], username: &str, kind: BlobKind) -> Result<Vec<u8>> {
    let key = Key::from_slice(key); // 32 bytes
    let cipher = ChaCha20Poly1305::new(key);

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = construct_aad(username, kind);
    let payload = Payload {
        msg: plaintext,
        aad: &aad,
    };

    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("encryption failure: {e}"))?;

    let mut result = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt a sealed blob. Expects `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if the blob is too short, tampered, or bound to a
/// different username or kind.
pub fn open(key: &[u8], data: &[u8], username: &str, kind: BlobKind) -> Result<Vec<u8>> {
    if data.len() < 12 {
        return Err(anyhow::anyhow!("invalid ciphertext length"));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key = Key::from_slice(key);
    let cipher = ChaCha20Poly1305::new(key);

    let aad = construct_aad(username, kind);
    let payload = Payload {
        msg: ciphertext,
        aad: &aad,
    };

    let plaintext = cipher
        .decrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("decryption failure: {e}"))?;

    Ok(plaintext)
}

fn construct_aad(username: &str, kind: BlobKind) -> Vec<u8> {
    format!("arkfile-totp:v1|{username}|{}", kind.as_str()).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::{BlobKind, open, seal};

    #[test]
    #[allow(clippy::unwrap_used)]
    fn seal_open_round_trip() {
        let key = [42u8; 32];
        let secret = b"JBSWY3DPEHPK3PXP";

        let sealed = seal(&key, secret, "alice", BlobKind::Secret).unwrap();
        assert_ne!(sealed, secret);
        assert!(sealed.len() > secret.len());

        let opened = open(&key, &sealed, "alice", BlobKind::Secret).unwrap();
        assert_eq!(opened, secret);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_for_other_user() {
        let key = [42u8; 32];
        let sealed = seal(&key, b"secret", "alice", BlobKind::Secret).unwrap();
        assert!(open(&key, &sealed, "bob", BlobKind::Secret).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_across_blob_kinds() {
        let key = [42u8; 32];
        let sealed = seal(&key, b"secret", "alice", BlobKind::Secret).unwrap();
        assert!(open(&key, &sealed, "alice", BlobKind::BackupCodes).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used, clippy::indexing_slicing)]
    fn open_fails_on_tampered_ciphertext() {
        let key = [42u8; 32];
        let mut sealed = seal(&key, b"secret", "alice", BlobKind::Secret).unwrap();

        let len = sealed.len();
        if let Some(byte) = sealed.get_mut(len - 1) {
            *byte ^= 0xFF;
        }

        assert!(open(&key, &sealed, "alice", BlobKind::Secret).is_err());
    }

    #[test]
    fn open_fails_on_truncated_blob() {
        let key = [42u8; 32];
        assert!(open(&key, &[0u8; 5], "alice", BlobKind::Secret).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn open_fails_with_wrong_key() {
        let sealed = seal(&[42u8; 32], b"secret", "alice", BlobKind::Secret).unwrap();
        assert!(open(&[43u8; 32], &sealed, "alice", BlobKind::Secret).is_err());
    }
}
