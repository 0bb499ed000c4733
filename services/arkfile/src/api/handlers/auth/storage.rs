//! Database helpers for user records and refresh tokens.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::db::{is_unique_violation, with_tx};

use super::utils::{generate_refresh_token, hash_refresh_token};

pub(super) const USER_STATUS_PENDING: &str = "pending";
pub(super) const USER_STATUS_APPROVED: &str = "approved";

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created,
    Conflict,
}

/// Minimal fields needed to run a login exchange.
pub(super) struct LoginRecord {
    pub(super) status: String,
    pub(super) opaque_record: Vec<u8>,
}

pub(super) async fn lookup_login_record(pool: &PgPool, email: &str) -> Result<Option<LoginRecord>> {
    let query = "SELECT status, opaque_record FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| LoginRecord {
        status: row.get("status"),
        opaque_record: row.get("opaque_record"),
    }))
}

/// Persist a new opaque record. Registration is not idempotent: a second
/// insert for the same identifier reports `Conflict` via the primary key.
pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    opaque_record: &[u8],
    device_capability: Option<&str>,
) -> Result<RegisterOutcome> {
    let query = r"
        INSERT INTO users (email, opaque_record, status, device_capability)
        VALUES ($1, $2, $3, $4)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(opaque_record)
        .bind(USER_STATUS_PENDING)
        .bind(device_capability)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(RegisterOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(RegisterOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Flip an account to approved. Returns false when the user is unknown.
/// The approval surface itself lives in the admin CLI, not in HTTP.
pub(crate) async fn approve_user(pool: &PgPool, email: &str) -> Result<bool> {
    let query = r"
        UPDATE users
        SET status = $2, approved_at = NOW()
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(USER_STATUS_APPROVED)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to approve user")?;
    Ok(result.rows_affected() == 1)
}

/// Mint and persist a refresh token, returning the raw value for the client.
/// Only the hash is stored; the insert retries on the (cosmically unlikely)
/// hash collision.
pub(super) async fn insert_refresh_token(
    pool: &PgPool,
    email: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO refresh_tokens (jti, email, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_refresh_token(&token);
        let result = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh token"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Rotate a refresh token: revoke the presented one and mint a replacement
/// inside a single transaction. Returns the owning email and the new raw
/// token, or `None` when the presented token is unknown, revoked, or
/// expired. If the mint fails, the rollback leaves the old token valid.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    presented_hash: Vec<u8>,
    ttl_seconds: i64,
) -> Result<Option<(String, String)>> {
    with_tx(pool, move |tx| {
        Box::pin(async move {
            let revoke = r"
                UPDATE refresh_tokens
                SET revoked_at = NOW()
                WHERE token_hash = $1
                  AND revoked_at IS NULL
                  AND expires_at > NOW()
                RETURNING email
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = revoke
            );
            let row = sqlx::query(revoke)
                .bind(&presented_hash)
                .fetch_optional(&mut **tx)
                .instrument(span)
                .await
                .context("failed to revoke presented refresh token")?;

            let Some(row) = row else {
                return Ok(None);
            };
            let email: String = row.get("email");

            let insert = r"
                INSERT INTO refresh_tokens (jti, email, token_hash, expires_at)
                VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = insert
            );
            let token = generate_refresh_token()?;
            let token_hash = hash_refresh_token(&token);
            sqlx::query(insert)
                .bind(Uuid::new_v4())
                .bind(&email)
                .bind(token_hash)
                .bind(ttl_seconds)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mint rotated refresh token")?;

            Ok(Some((email, token)))
        })
    })
    .await
}

/// Revoke one live refresh token by hash. Returns false when nothing was
/// live under that hash.
pub(super) async fn revoke_refresh_by_hash(pool: &PgPool, token_hash: &[u8]) -> Result<bool> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1 AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(result.rows_affected() == 1)
}

/// Revoke every live refresh token of a user in one statement. In-flight
/// access tokens stay valid until their `exp`.
pub(super) async fn revoke_all_for_user(pool: &PgPool, email: &str) -> Result<u64> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE email = $1 AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh tokens")?;
    Ok(result.rows_affected())
}
