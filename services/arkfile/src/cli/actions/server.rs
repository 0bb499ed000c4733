use crate::{api, api::handlers::auth::AuthConfig, keys::ServerKeys};
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub key_dir: PathBuf,
    pub opaque_server_id: String,
    pub totp_issuer: String,
    pub refresh_ttl_seconds: i64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if key material cannot be loaded or the server fails to
/// start. A key-load failure refuses to serve; there is no degraded mode.
pub async fn execute(args: Args) -> Result<()> {
    let keys = ServerKeys::init(&args.key_dir).with_context(|| {
        format!(
            "failed to initialize server keys under {}",
            args.key_dir.display()
        )
    })?;

    let config = AuthConfig::new()
        .with_opaque_server_id(args.opaque_server_id)
        .with_totp_issuer(args.totp_issuer)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds);

    api::new(args.port, args.dsn, config, keys).await
}
