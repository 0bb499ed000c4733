use crate::api::handlers::auth::storage::approve_user;
use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub email: String,
}

/// Flip a pending account to approved. Registration never auto-approves;
/// this is the operator-side half of that handshake.
///
/// # Errors
/// Returns an error if the database is unreachable or no such account
/// exists.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let email = args.email.trim().to_lowercase();
    if approve_user(&pool, &email).await? {
        println!("Approved {email}");
        Ok(())
    } else {
        bail!("no account found for {email}")
    }
}
