use crate::db::is_unique_violation;
use crate::totp::models::TotpState;
use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};

/// Outcome of an enrollment insert.
#[derive(Debug)]
pub(crate) enum SetupOutcome {
    Stored,
    AlreadyEnrolled,
}

pub struct TotpRepo;

impl TotpRepo {
    /// Store a fresh (unconfirmed) enrollment.
    ///
    /// Replaces any non-enabled leftover row for the user; an enabled row
    /// wins the race via the primary key and reports `AlreadyEnrolled`.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub(crate) async fn insert_setup(
        pool: &PgPool,
        username: &str,
        secret_encrypted: &[u8],
        backup_codes_encrypted: &[u8],
    ) -> Result<SetupOutcome> {
        let mut tx = pool.begin().await?;

        // Abandoned or disabled enrollments are replaced, not resumed.
        sqlx::query("DELETE FROM user_totp WHERE username = $1 AND enabled = FALSE")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO user_totp (username, secret_encrypted, backup_codes_encrypted)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(username)
        .bind(secret_encrypted)
        .bind(backup_codes_encrypted)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                let _ = tx.rollback().await;
                return Ok(SetupOutcome::AlreadyEnrolled);
            }
            Err(err) => return Err(err).context("failed to insert TOTP setup"),
        }

        tx.commit().await?;
        Ok(SetupOutcome::Stored)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub(crate) async fn load(pool: &PgPool, username: &str) -> Result<Option<TotpState>> {
        sqlx::query_as::<_, TotpState>("SELECT * FROM user_totp WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await
            .context("failed to load TOTP state")
    }

    /// Flip an unconfirmed enrollment to enabled. Compare-and-set: returns
    /// false if no unconfirmed row was there to flip.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub(crate) async fn mark_completed(
        tx: &mut Transaction<'static, Postgres>,
        username: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE user_totp
            SET enabled = TRUE, setup_completed = TRUE, last_used = NOW()
            WHERE username = $1 AND setup_completed = FALSE
            ",
        )
        .bind(username)
        .execute(&mut **tx)
        .await
        .context("failed to complete TOTP setup")?;
        Ok(result.rows_affected() == 1)
    }

    /// Disable an enabled enrollment. Compare-and-set: returns false if the
    /// row was not enabled.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub(crate) async fn mark_disabled(
        tx: &mut Transaction<'static, Postgres>,
        username: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_totp SET enabled = FALSE WHERE username = $1 AND enabled = TRUE",
        )
        .bind(username)
        .execute(&mut **tx)
        .await
        .context("failed to disable TOTP")?;
        Ok(result.rows_affected() == 1)
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub(crate) async fn touch_last_used(pool: &PgPool, username: &str) -> Result<()> {
        sqlx::query("UPDATE user_totp SET last_used = NOW() WHERE username = $1")
            .bind(username)
            .execute(pool)
            .await
            .context("failed to touch last_used")?;
        Ok(())
    }

    /// Conditional insert into the TOTP usage log: the linearization point
    /// for replay defense. Returns false when the `(username, code_hash,
    /// window_start)` key is already present.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any other reason.
    pub(crate) async fn insert_totp_usage<'e, E>(
        executor: E,
        username: &str,
        code_hash: &str,
        window_start: i64,
    ) -> Result<bool>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r"
            INSERT INTO totp_usage_log (username, code_hash, window_start)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(username)
        .bind(code_hash)
        .bind(window_start)
        .execute(executor)
        .await
        .context("failed to record TOTP usage")?;
        Ok(result.rows_affected() == 1)
    }

    /// Conditional insert into the backup usage log. Returns false when the
    /// code was already burned.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any other reason.
    pub(crate) async fn insert_backup_usage(
        pool: &PgPool,
        username: &str,
        code_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO totp_backup_usage (username, code_hash)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(username)
        .bind(code_hash)
        .execute(pool)
        .await
        .context("failed to record backup code usage")?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove both usage logs for a user (part of disable).
    ///
    /// # Errors
    /// Returns an error if either delete fails.
    pub(crate) async fn clear_usage_logs(
        tx: &mut Transaction<'static, Postgres>,
        username: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM totp_usage_log WHERE username = $1")
            .bind(username)
            .execute(&mut **tx)
            .await
            .context("failed to clear TOTP usage log")?;
        sqlx::query("DELETE FROM totp_backup_usage WHERE username = $1")
            .bind(username)
            .execute(&mut **tx)
            .await
            .context("failed to clear backup usage log")?;
        Ok(())
    }

    /// Drop usage-log rows past their retention windows. Idempotent.
    ///
    /// # Errors
    /// Returns an error if either delete fails.
    pub(crate) async fn cleanup_usage_logs(
        pool: &PgPool,
        totp_retention_seconds: i64,
        backup_retention_seconds: i64,
    ) -> Result<(u64, u64)> {
        let totp = sqlx::query(
            "DELETE FROM totp_usage_log WHERE used_at < NOW() - ($1 * INTERVAL '1 second')",
        )
        .bind(totp_retention_seconds)
        .execute(pool)
        .await
        .context("failed to clean TOTP usage log")?;

        let backup = sqlx::query(
            "DELETE FROM totp_backup_usage WHERE used_at < NOW() - ($1 * INTERVAL '1 second')",
        )
        .bind(backup_retention_seconds)
        .execute(pool)
        .await
        .context("failed to clean backup usage log")?;

        Ok((totp.rows_affected(), backup.rows_affected()))
    }
}
