//! Access tokens for the Arkfile auth core.
//!
//! Tokens are compact JWS (three base64url segments) signed with
//! HMAC-SHA-256. The signing side always uses the ring's current key and
//! stamps its `kid` into the protected header; verification accepts the
//! current key plus any retained previous key, which is what makes key
//! rotation a deploy-time operation instead of a mass logout.
//!
//! Refresh tokens are deliberately *not* defined here: they are opaque
//! random strings whose only server-side representation is a hash in the
//! auth store. This crate only covers the signed, stateless credential.

pub mod claims;
pub mod error;
pub mod jwt;
pub mod keyring;

pub use claims::{ACCESS_TOKEN_TTL_SECONDS, AUDIENCE, AccessClaims, ISSUER};
pub use error::Error;
pub use jwt::{sign, verify};
pub use keyring::{KeyRing, SigningKey};
