//! TOTP enrollment, validation, replay defense, and backup codes.

use anyhow::{Context, anyhow};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};
use zeroize::Zeroizing;

use crate::keys::TotpMasterKey;
use crate::totp::crypto::{self, BlobKind};
use crate::totp::models::{TotpSetup, TotpState};
use crate::totp::repo::{SetupOutcome, TotpRepo};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: i64 = 30;
// One step of tolerance on either side of the current window.
const TOTP_SKEW_STEPS: i64 = 1;

const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 12;
const BACKUP_CODE_GROUP_SIZE: usize = 4;
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Usage-log retention: TOTP fingerprints age out after a day, burned
/// backup codes are kept long enough to outlive any realistic replay.
const TOTP_LOG_RETENTION_SECONDS: i64 = 24 * 60 * 60;
const BACKUP_LOG_RETENTION_SECONDS: i64 = 90 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TotpError {
    #[error("totp already enrolled")]
    AlreadyEnrolled,
    #[error("totp enrollment not found")]
    NotEnrolled,
    #[error("totp not enabled")]
    NotEnabled,
    #[error("invalid code")]
    InvalidCode,
    #[error("code already used")]
    ReplayDetected,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct TotpService {
    pool: PgPool,
    master: TotpMasterKey,
    issuer: String,
}

impl TotpService {
    #[must_use]
    pub fn new(pool: PgPool, master: TotpMasterKey, issuer: String) -> Self {
        Self {
            pool,
            master,
            issuer,
        }
    }

    /// Draw a fresh secret and backup-code batch for enrollment.
    ///
    /// Pure generation; nothing is persisted until [`Self::store_setup`].
    ///
    /// # Errors
    /// Returns an error if secret generation fails.
    pub fn generate_setup(&self, username: &str) -> Result<TotpSetup, TotpError> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| anyhow!("secret generation error: {e:?}"))?;

        let totp = TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            1,
            TOTP_STEP_SECONDS.unsigned_abs(),
            secret_bytes,
            Some(self.issuer.clone()),
            username.to_string(),
        )
        .map_err(|e| anyhow!("totp init error: {e}"))?;

        let secret_b32 = totp.get_secret_base32();
        let qr_url = totp.get_url();
        let manual_entry = group_base32(&secret_b32);

        let mut rng = OsRng;
        let mut backup_codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        for _ in 0..BACKUP_CODE_COUNT {
            backup_codes.push(format_backup_code(&generate_backup_code(&mut rng))?);
        }

        Ok(TotpSetup {
            secret: secret_b32,
            qr_url,
            manual_entry,
            backup_codes,
        })
    }

    /// Encrypt and persist an enrollment with `enabled = false,
    /// setup_completed = false`.
    ///
    /// # Errors
    /// `AlreadyEnrolled` if the user already has an active enrollment.
    pub async fn store_setup(&self, username: &str, setup: &TotpSetup) -> Result<(), TotpError> {
        let user_key = self.master.derive_user_key(username);

        let secret_encrypted = crypto::seal(
            user_key.as_bytes(),
            setup.secret.as_bytes(),
            username,
            BlobKind::Secret,
        )?;

        // Backup codes are stored normalized; presentation strips the dashes
        // again before comparing.
        let normalized: Vec<String> = setup
            .backup_codes
            .iter()
            .map(|code| normalize_backup_code(code))
            .collect();
        let backup_plain = Zeroizing::new(
            serde_json::to_vec(&normalized).map_err(|e| anyhow!("backup set encoding: {e}"))?,
        );
        let backup_codes_encrypted = crypto::seal(
            user_key.as_bytes(),
            &backup_plain,
            username,
            BlobKind::BackupCodes,
        )?;

        match TotpRepo::insert_setup(&self.pool, username, &secret_encrypted, &backup_codes_encrypted)
            .await?
        {
            SetupOutcome::Stored => Ok(()),
            SetupOutcome::AlreadyEnrolled => Err(TotpError::AlreadyEnrolled),
        }
    }

    /// Confirm enrollment with a live code, flipping `enabled = true`.
    ///
    /// The code is consumed through the usage log inside the same
    /// transaction as the flag flip, so it cannot be replayed afterwards and
    /// a cancelled call leaves nothing half-enrolled.
    ///
    /// # Errors
    /// `InvalidCode` when the code does not match the current window ±1;
    /// `ReplayDetected` when it was already consumed; `AlreadyEnrolled` when
    /// the enrollment was completed concurrently.
    pub async fn complete_setup(&self, username: &str, code: &str) -> Result<(), TotpError> {
        let state = self.load_state(username).await?;
        if state.setup_completed {
            return Err(TotpError::AlreadyEnrolled);
        }

        let window_start = self.matching_window_for(&state, code)?;
        let fingerprint = totp_code_fingerprint(username, code, window_start);

        // Drop of `tx` on any early return rolls everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin complete_setup transaction")?;
        if !TotpRepo::insert_totp_usage(&mut *tx, username, &fingerprint, window_start).await? {
            return Err(TotpError::ReplayDetected);
        }
        if !TotpRepo::mark_completed(&mut tx, username).await? {
            return Err(TotpError::AlreadyEnrolled);
        }
        tx.commit()
            .await
            .context("commit complete_setup transaction")?;
        Ok(())
    }

    /// Validate a live code against an enabled enrollment.
    ///
    /// Accepts the current window and one on either side; the conditional
    /// usage-log insert is the linearization point, so of two concurrent
    /// presentations of the same code exactly one succeeds.
    ///
    /// # Errors
    /// `NotEnabled`, `InvalidCode`, or `ReplayDetected`.
    pub async fn validate_code(&self, username: &str, code: &str) -> Result<(), TotpError> {
        let state = self.load_state(username).await?;
        if !state.enabled {
            return Err(TotpError::NotEnabled);
        }

        let window_start = self.matching_window_for(&state, code)?;
        let fingerprint = totp_code_fingerprint(username, code, window_start);

        if !TotpRepo::insert_totp_usage(&self.pool, username, &fingerprint, window_start).await? {
            return Err(TotpError::ReplayDetected);
        }

        TotpRepo::touch_last_used(&self.pool, username).await?;
        Ok(())
    }

    /// Validate a one-shot backup code. The code is burned on success.
    ///
    /// # Errors
    /// `NotEnabled`, `InvalidCode` when the code is not in the remaining
    /// set, `ReplayDetected` when it was already burned.
    pub async fn validate_backup(&self, username: &str, code: &str) -> Result<(), TotpError> {
        let state = self.load_state(username).await?;
        if !state.enabled {
            return Err(TotpError::NotEnabled);
        }

        let user_key = self.master.derive_user_key(username);
        let backup_plain = Zeroizing::new(crypto::open(
            user_key.as_bytes(),
            &state.backup_codes_encrypted,
            username,
            BlobKind::BackupCodes,
        )?);
        let codes: Vec<String> = serde_json::from_slice(&backup_plain)
            .map_err(|e| anyhow!("backup set decoding: {e}"))?;

        let normalized = normalize_backup_code(code);
        if !search_backup_set(&codes, &normalized) {
            return Err(TotpError::InvalidCode);
        }

        let fingerprint = backup_code_fingerprint(username, &normalized);
        if !TotpRepo::insert_backup_usage(&self.pool, username, &fingerprint).await? {
            return Err(TotpError::ReplayDetected);
        }

        TotpRepo::touch_last_used(&self.pool, username).await?;
        Ok(())
    }

    /// Disable TOTP. Requires a currently valid TOTP code; backup codes are
    /// deliberately not accepted here. Clears both usage logs for the user.
    ///
    /// # Errors
    /// `NotEnabled`, `InvalidCode`, or `ReplayDetected`.
    pub async fn disable(&self, username: &str, code: &str) -> Result<(), TotpError> {
        let state = self.load_state(username).await?;
        if !state.enabled {
            return Err(TotpError::NotEnabled);
        }

        let window_start = self.matching_window_for(&state, code)?;
        let fingerprint = totp_code_fingerprint(username, code, window_start);

        let mut tx = self.pool.begin().await.context("begin disable transaction")?;
        if !TotpRepo::insert_totp_usage(&mut *tx, username, &fingerprint, window_start).await? {
            return Err(TotpError::ReplayDetected);
        }
        if !TotpRepo::mark_disabled(&mut tx, username).await? {
            return Err(TotpError::NotEnabled);
        }
        TotpRepo::clear_usage_logs(&mut tx, username).await?;
        tx.commit().await.context("commit disable transaction")?;
        Ok(())
    }

    /// Drop usage-log rows past retention. Idempotent; safe to run on a
    /// timer from the server loop.
    ///
    /// # Errors
    /// Returns an error if a delete fails.
    pub async fn cleanup_logs(&self) -> Result<(u64, u64), TotpError> {
        Ok(TotpRepo::cleanup_usage_logs(
            &self.pool,
            TOTP_LOG_RETENTION_SECONDS,
            BACKUP_LOG_RETENTION_SECONDS,
        )
        .await?)
    }

    async fn load_state(&self, username: &str) -> Result<TotpState, TotpError> {
        TotpRepo::load(&self.pool, username)
            .await?
            .ok_or(TotpError::NotEnrolled)
    }

    /// Decrypt the user's secret and find the window the code belongs to.
    fn matching_window_for(&self, state: &TotpState, code: &str) -> Result<i64, TotpError> {
        let user_key = self.master.derive_user_key(&state.username);
        let secret_plain = Zeroizing::new(crypto::open(
            user_key.as_bytes(),
            &state.secret_encrypted,
            &state.username,
            BlobKind::Secret,
        )?);
        let secret_b32 = std::str::from_utf8(&secret_plain)
            .map_err(|_| anyhow!("stored secret is not valid base32 text"))?;

        let totp = build_totp(secret_b32, &self.issuer, &state.username)?;
        let now = unix_now()?;
        matching_window(&totp, code, now).ok_or(TotpError::InvalidCode)
    }
}

fn unix_now() -> Result<i64, TotpError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("system clock before epoch: {e}"))?;
    Ok(i64::try_from(now.as_secs()).map_err(|_| anyhow!("system clock out of range"))?)
}

fn build_totp(secret_b32: &str, issuer: &str, username: &str) -> Result<TOTP, TotpError> {
    let secret_bytes = Secret::Encoded(secret_b32.to_string())
        .to_bytes()
        .map_err(|e| anyhow!("secret decoding error: {e:?}"))?;
    Ok(TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        1,
        TOTP_STEP_SECONDS.unsigned_abs(),
        secret_bytes,
        Some(issuer.to_string()),
        username.to_string(),
    )
    .map_err(|e| anyhow!("totp init error: {e}"))?)
}

/// Check `code` against the windows at `now` ± skew, in constant time per
/// candidate. Returns the start of the matching window.
fn matching_window(totp: &TOTP, code: &str, now: i64) -> Option<i64> {
    let mut matched = None;
    for offset in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
        let at = now + offset * TOTP_STEP_SECONDS;
        if at < 0 {
            continue;
        }
        let expected = totp.generate(at.unsigned_abs());
        if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
            matched = Some((at / TOTP_STEP_SECONDS) * TOTP_STEP_SECONDS);
        }
    }
    matched
}

/// Constant-time membership test over the whole remaining set; every stored
/// code is compared regardless of earlier matches.
fn search_backup_set(codes: &[String], normalized: &str) -> bool {
    let mut found = Choice::from(0u8);
    for stored in codes {
        found |= stored.as_bytes().ct_eq(normalized.as_bytes());
    }
    bool::from(found)
}

/// Strip separators and upper-case for comparison; backup codes are
/// case-insensitive on input.
fn normalize_backup_code(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

fn generate_backup_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut raw = [0u8; BACKUP_CODE_LEN];
    rng.fill_bytes(&mut raw);
    let mut normalized = String::with_capacity(BACKUP_CODE_LEN);
    for byte in raw {
        let idx = usize::from(byte) % BACKUP_CODE_ALPHABET.len();
        if let Some(&char_byte) = BACKUP_CODE_ALPHABET.get(idx) {
            normalized.push(char_byte as char);
        }
    }
    normalized
}

fn format_backup_code(normalized: &str) -> Result<String, TotpError> {
    if normalized.len() != BACKUP_CODE_LEN {
        return Err(TotpError::Store(anyhow!("invalid backup code length")));
    }
    let mut out = String::with_capacity(BACKUP_CODE_LEN + 2);
    for (idx, chunk) in normalized
        .as_bytes()
        .chunks(BACKUP_CODE_GROUP_SIZE)
        .enumerate()
    {
        if idx > 0 {
            out.push('-');
        }
        out.push_str(
            std::str::from_utf8(chunk).map_err(|_| anyhow!("invalid backup code chunk"))?,
        );
    }
    Ok(out)
}

/// Group a base32 secret into 4-character blocks for manual entry.
fn group_base32(secret: &str) -> String {
    secret
        .as_bytes()
        .chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Salted fingerprint of a code and its window; what the usage log stores
/// instead of the code itself.
fn totp_code_fingerprint(username: &str, code: &str, window_start: i64) -> String {
    hex_digest(format!("arkfile-totp-usage|{username}|{code}|{window_start}").as_bytes())
}

fn backup_code_fingerprint(username: &str, normalized: &str) -> String {
    hex_digest(format!("arkfile-backup-usage|{username}|{normalized}").as_bytes())
}

fn hex_digest(input: &[u8]) -> String {
    Sha256::digest(input)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    fn test_totp() -> TOTP {
        match build_totp(TEST_SECRET, "Arkfile", "alice") {
            Ok(totp) => totp,
            Err(err) => panic!("failed to build test TOTP: {err}"),
        }
    }

    #[test]
    fn matching_window_accepts_current_and_neighbours() {
        let totp = test_totp();
        let now = 1_700_000_015; // mid-window

        let current = totp.generate(1_700_000_015);
        assert_eq!(matching_window(&totp, &current, now), Some(1_700_000_010));

        let previous = totp.generate(1_700_000_015 - 30);
        assert_eq!(
            matching_window(&totp, &previous, now),
            Some(1_700_000_010 - 30)
        );

        let next = totp.generate(1_700_000_015 + 30);
        assert_eq!(matching_window(&totp, &next, now), Some(1_700_000_010 + 30));
    }

    #[test]
    fn matching_window_rejects_outside_skew() {
        let totp = test_totp();
        let now = 1_700_000_015;

        let stale = totp.generate(1_700_000_015 - 90);
        assert_eq!(matching_window(&totp, &stale, now), None);

        assert_eq!(matching_window(&totp, "000000", now), None);
        assert_eq!(matching_window(&totp, "1234567", now), None);
    }

    #[test]
    fn codes_from_another_secret_do_not_match() {
        let totp = test_totp();
        let other = match build_totp("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ", "Arkfile", "bob") {
            Ok(totp) => totp,
            Err(err) => panic!("failed to build TOTP: {err}"),
        };
        let now = 1_700_000_015;
        let foreign = other.generate(1_700_000_015);
        assert_eq!(matching_window(&totp, &foreign, now), None);
    }

    #[test]
    fn fingerprints_bind_user_code_and_window() {
        let base = totp_code_fingerprint("alice", "123456", 1_700_000_010);
        assert_eq!(base, totp_code_fingerprint("alice", "123456", 1_700_000_010));
        assert_ne!(base, totp_code_fingerprint("bob", "123456", 1_700_000_010));
        assert_ne!(base, totp_code_fingerprint("alice", "654321", 1_700_000_010));
        assert_ne!(base, totp_code_fingerprint("alice", "123456", 1_700_000_040));
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn backup_codes_normalize_case_insensitively() {
        assert_eq!(normalize_backup_code("abcd-efgh-jklm"), "ABCDEFGHJKLM");
        assert_eq!(normalize_backup_code(" ABCD EFGH JKLM "), "ABCDEFGHJKLM");
    }

    #[test]
    fn backup_code_generation_shape() {
        let mut rng = OsRng;
        let normalized = generate_backup_code(&mut rng);
        assert_eq!(normalized.len(), BACKUP_CODE_LEN);
        assert!(
            normalized
                .bytes()
                .all(|byte| BACKUP_CODE_ALPHABET.contains(&byte))
        );

        let formatted = match format_backup_code(&normalized) {
            Ok(formatted) => formatted,
            Err(err) => panic!("format failed: {err}"),
        };
        assert_eq!(formatted.len(), BACKUP_CODE_LEN + 2);
        assert_eq!(normalize_backup_code(&formatted), normalized);
    }

    #[test]
    fn backup_set_search_is_exact() {
        let codes = vec!["ABCDEFGHJKLM".to_string(), "NPQRSTUVWXYZ".to_string()];
        assert!(search_backup_set(&codes, "ABCDEFGHJKLM"));
        assert!(search_backup_set(&codes, "NPQRSTUVWXYZ"));
        assert!(!search_backup_set(&codes, "INVALIDCODE"));
        assert!(!search_backup_set(&codes, "ABCDEFGHJKLN"));
        assert!(!search_backup_set(&codes, ""));
    }

    #[test]
    fn manual_entry_groups_by_four() {
        assert_eq!(group_base32("JBSWY3DPEHPK3PXP"), "JBSW Y3DP EHPK 3PXP");
    }
}
