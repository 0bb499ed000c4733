use crate::cli::{
    actions::{Action, approve, server},
    commands,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Turn parsed arguments into an executable [`Action`].
///
/// # Errors
///
/// Returns an error if a required argument is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    if let Some(sub) = matches.subcommand_matches(commands::CMD_APPROVE) {
        let email = sub
            .get_one::<String>("email")
            .cloned()
            .context("missing required argument: --email")?;
        return Ok(Action::Approve(approve::Args { dsn, email }));
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let key_dir = matches
        .get_one::<String>("key-dir")
        .map(PathBuf::from)
        .context("missing required argument: --key-dir")?;
    let opaque_server_id = matches
        .get_one::<String>("opaque-server-id")
        .cloned()
        .context("missing required argument: --opaque-server-id")?;
    let totp_issuer = matches
        .get_one::<String>("totp-issuer")
        .cloned()
        .context("missing required argument: --totp-issuer")?;
    let refresh_ttl_seconds = matches
        .get_one::<i64>("refresh-ttl-seconds")
        .copied()
        .unwrap_or(2_592_000);

    Ok(Action::Server(server::Args {
        port,
        dsn,
        key_dir,
        opaque_server_id,
        totp_issuer,
        refresh_ttl_seconds,
    }))
}
