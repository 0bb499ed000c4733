//! Server key material: loading, first-boot generation, and ownership.
//!
//! All long-lived secrets live under one key directory:
//!
//! ```text
//! <key-dir>/opaque_server.seed     32-byte OPAQUE server seed
//! <key-dir>/totp_master.key        32-byte TOTP master key
//! <key-dir>/jwt/current/signing.key        active JWT signing key
//! <key-dir>/jwt/<previous>/signing.key     verify-only prior keys
//! ```
//!
//! Missing OPAQUE/TOTP/JWT keys are generated on first boot; anything
//! unreadable or malformed aborts startup. Key files are written mode 0600
//! and never rewritten once present. Components receive capabilities carved
//! out of [`ServerKeys`] at startup; nothing re-reads the key directory on a
//! hot path.

pub mod totp;

pub use totp::{TotpMasterKey, TotpUserKey};

use anyhow::{Context, Result, bail};
use arkfile_token::KeyRing;
use rand::{RngCore, rngs::OsRng};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::info;
use zeroize::Zeroizing;

const OPAQUE_SEED_FILE: &str = "opaque_server.seed";
const TOTP_MASTER_FILE: &str = "totp_master.key";
const JWT_RING_DIR: &str = "jwt";
const JWT_CURRENT_KEY: &str = "current/signing.key";
const KEY_LEN: usize = 32;
const KEY_FILE_MODE: u32 = 0o600;
const KEY_DIR_MODE: u32 = 0o700;

/// All server-held key material, loaded once before the listener binds.
pub struct ServerKeys {
    opaque_seed: [u8; KEY_LEN],
    totp_master: TotpMasterKey,
    token_ring: KeyRing,
}

impl ServerKeys {
    /// Load every server key from `key_dir`, generating missing ones.
    ///
    /// Idempotent: a second call observes the same material. Any failure here
    /// is fatal for the process; a server without its keys must not serve.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, a key file is
    /// unreadable or has the wrong length, or the JWT ring is invalid.
    pub fn init(key_dir: &Path) -> Result<Self> {
        ensure_dir(key_dir)?;

        let opaque_seed = load_or_generate(&key_dir.join(OPAQUE_SEED_FILE))?;
        let totp_master = TotpMasterKey::new(load_or_generate(&key_dir.join(TOTP_MASTER_FILE))?);

        let ring_dir = key_dir.join(JWT_RING_DIR);
        let current_key = ring_dir.join(JWT_CURRENT_KEY);
        if !current_key.is_file() {
            let parent = current_key
                .parent()
                .context("jwt signing key path has no parent")?;
            ensure_dir(parent)?;
            let _ = load_or_generate(&current_key)?;
            info!("Generated initial JWT signing key");
        }
        let token_ring =
            KeyRing::from_dir(&ring_dir).map_err(|err| anyhow::anyhow!("{err}"))?;

        Ok(Self {
            opaque_seed,
            totp_master,
            token_ring,
        })
    }

    /// Hand out the key material to the components that own it at runtime.
    #[must_use]
    pub fn into_parts(self) -> ([u8; KEY_LEN], TotpMasterKey, KeyRing) {
        (self.opaque_seed, self.totp_master, self.token_ring)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create key directory {}", dir.display()))?;
        fs::set_permissions(dir, fs::Permissions::from_mode(KEY_DIR_MODE))
            .with_context(|| format!("failed to set mode on {}", dir.display()))?;
    }
    Ok(())
}

/// Read a 32-byte key file, or generate and persist one (mode 0600).
fn load_or_generate(path: &Path) -> Result<[u8; KEY_LEN]> {
    if path.is_file() {
        let bytes = Zeroizing::new(
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        );
        if bytes.len() != KEY_LEN {
            bail!(
                "{} holds {} bytes, expected {KEY_LEN}",
                path.display(),
                bytes.len()
            );
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let mut key = [0u8; KEY_LEN];
    OsRng
        .try_fill_bytes(&mut key)
        .context("failed to draw key material")?;
    fs::write(path, key).with_context(|| format!("failed to write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(KEY_FILE_MODE))
        .with_context(|| format!("failed to set mode on {}", path.display()))?;
    info!("Generated key file {}", path.display());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::ServerKeys;
    use anyhow::Result;
    use std::os::unix::fs::PermissionsExt;

    fn temp_key_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("arkfile-keys-{tag}-{}", std::process::id()))
    }

    #[test]
    fn init_generates_then_reloads_identical_material() -> Result<()> {
        let dir = temp_key_dir("roundtrip");
        let _ = std::fs::remove_dir_all(&dir);

        let first = ServerKeys::init(&dir)?;
        let second = ServerKeys::init(&dir)?;

        let (seed_one, master_one, ring_one) = first.into_parts();
        let (seed_two, master_two, ring_two) = second.into_parts();
        assert_eq!(seed_one, seed_two);
        assert_eq!(
            master_one.derive_user_key("alice").as_bytes(),
            master_two.derive_user_key("alice").as_bytes()
        );
        assert_eq!(ring_one.current().kid(), ring_two.current().kid());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn key_files_are_owner_only() -> Result<()> {
        let dir = temp_key_dir("modes");
        let _ = std::fs::remove_dir_all(&dir);
        let _keys = ServerKeys::init(&dir)?;

        let mode = std::fs::metadata(dir.join("opaque_server.seed"))?
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn truncated_key_file_is_fatal() -> Result<()> {
        let dir = temp_key_dir("truncated");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("totp_master.key"), [0u8; 7])?;

        assert!(ServerKeys::init(&dir).is_err());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
