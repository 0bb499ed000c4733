//! # Arkfile (authentication and session core)
//!
//! `arkfile` is the authentication authority for the Arkfile end-to-end
//! encrypted file store. It establishes identity with the `OPAQUE`
//! password-authenticated key exchange (the server never sees a password or
//! anything offline-attackable derived from one), gates a second factor
//! through TOTP plus one-shot backup codes, and issues bearer credentials:
//! a 24-hour HMAC-signed access token and a rotating opaque refresh token.
//!
//! ## Session keys
//!
//! A successful login derives a 32-byte session key from the `OPAQUE` export
//! key on both sides of the exchange. The client uses it to encrypt
//! account-password-protected files; the server returns it once in the login
//! response and never persists it.
//!
//! ## Key material
//!
//! All server secrets live under a single key directory: the `OPAQUE` server
//! seed, the TOTP master key (per-user TOTP encryption keys are derived from
//! it, never stored), and the JWT signing-key ring. Missing keys are
//! generated on first boot; unreadable keys abort startup.
//!
//! ## Replay defense
//!
//! TOTP and backup codes are single-use. Usage logs carry unique indexes and
//! every validation ends in a conditional insert, so two concurrent
//! presentations of the same code race on the index and exactly one wins.

pub mod api;
pub mod cli;
mod db;
pub mod keys;
pub mod opaque;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
