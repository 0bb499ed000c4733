//! HMAC signing-key ring.
//!
//! On disk the ring is a directory: `current/signing.key` holds the active
//! signing secret, sibling directories hold prior keys kept for
//! verification only. A `kid` is derived from the key bytes themselves
//! (first eight hex chars of their SHA-256), so rotation is just moving
//! directories around; no side-car metadata to keep in sync.

use secrecy::{ExposeSecret, SecretBox};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::Error;

const SIGNING_KEY_FILE: &str = "signing.key";
const CURRENT_DIR: &str = "current";
const MIN_KEY_LEN: usize = 32;

pub struct SigningKey {
    kid: String,
    secret: SecretBox<Vec<u8>>,
}

impl SigningKey {
    /// Wrap raw key material. Rejects keys shorter than 32 bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() < MIN_KEY_LEN {
            return Err(Error::KeyLoad(format!(
                "signing key too short: {} bytes, need at least {MIN_KEY_LEN}",
                bytes.len()
            )));
        }
        let kid = derive_kid(&bytes);
        Ok(Self {
            kid,
            secret: SecretBox::new(Box::new(bytes)),
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.expose_secret()
    }
}

/// Key id for a signing secret: first eight hex chars of SHA-256(key).
#[must_use]
pub fn derive_kid(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub struct KeyRing {
    current: SigningKey,
    previous: Vec<SigningKey>,
}

impl KeyRing {
    #[must_use]
    pub fn new(current: SigningKey) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_previous(mut self, key: SigningKey) -> Self {
        self.previous.push(key);
        self
    }

    #[must_use]
    pub fn current(&self) -> &SigningKey {
        &self.current
    }

    /// Look up a key by `kid`, current key first.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        if self.current.kid == kid {
            return Some(&self.current);
        }
        self.previous.iter().find(|key| key.kid == kid)
    }

    /// Load the ring from its on-disk layout.
    ///
    /// # Errors
    /// Returns `Error::KeyLoad` if the `current` key is missing or any key
    /// file is unreadable or too short. A ring without a current key cannot
    /// issue tokens, so that is fatal; sibling directories without a
    /// `signing.key` file are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self, Error> {
        let current_path = dir.join(CURRENT_DIR).join(SIGNING_KEY_FILE);
        let current_bytes = fs::read(&current_path).map_err(|err| {
            Error::KeyLoad(format!("read {}: {err}", current_path.display()))
        })?;
        let mut ring = Self::new(SigningKey::new(current_bytes)?);

        let entries = fs::read_dir(dir)
            .map_err(|err| Error::KeyLoad(format!("read {}: {err}", dir.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| Error::KeyLoad(format!("read {}: {err}", dir.display())))?;
            if entry.file_name() == CURRENT_DIR {
                continue;
            }
            let key_path = entry.path().join(SIGNING_KEY_FILE);
            if !key_path.is_file() {
                continue;
            }
            let bytes = fs::read(&key_path)
                .map_err(|err| Error::KeyLoad(format!("read {}: {err}", key_path.display())))?;
            ring = ring.with_previous(SigningKey::new(bytes)?);
        }

        Ok(ring)
    }
}
