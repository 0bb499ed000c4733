use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow};

/// Persisted TOTP state for one user. At most one row per username;
/// `enabled` implies `setup_completed`.
#[derive(Debug, Clone)]
pub struct TotpState {
    pub username: String,
    pub secret_encrypted: Vec<u8>,
    pub backup_codes_encrypted: Vec<u8>,
    pub enabled: bool,
    pub setup_completed: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for TotpState {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            username: row.try_get("username")?,
            secret_encrypted: row.try_get("secret_encrypted")?,
            backup_codes_encrypted: row.try_get("backup_codes_encrypted")?,
            enabled: row.try_get("enabled")?,
            setup_completed: row.try_get("setup_completed")?,
            created_at: row.try_get("created_at")?,
            last_used: row.try_get("last_used")?,
        })
    }
}

/// Enrollment material handed to the user exactly once. The secret and the
/// backup codes are only ever stored encrypted.
#[derive(Debug)]
pub struct TotpSetup {
    /// Base32 secret for authenticator apps.
    pub secret: String,
    /// `otpauth://` provisioning URL.
    pub qr_url: String,
    /// The secret grouped in 4-character blocks for hand entry.
    pub manual_entry: String,
    /// Ten one-shot recovery codes, formatted `XXXX-XXXX-XXXX`.
    pub backup_codes: Vec<String>,
}
