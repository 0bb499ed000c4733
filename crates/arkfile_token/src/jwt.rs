use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};

use crate::claims::{AUDIENCE, AccessClaims, ISSUER};
use crate::error::Error;
use crate::keyring::KeyRing;

/// Clock skew tolerance applied to `exp` and `nbf` checks.
pub const CLOCK_SKEW_LEEWAY_SECONDS: u64 = 60;

/// Sign claims with the ring's current key, stamping its `kid` into the
/// protected header.
///
/// # Errors
/// Returns `Error::Encode` if claim serialization fails.
pub fn sign(claims: &AccessClaims, ring: &KeyRing) -> Result<String, Error> {
    let current = ring.current();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(current.kid().to_string());
    encode(&header, claims, &EncodingKey::from_secret(current.secret()))
        .map_err(|_| Error::Encode)
}

/// Verify a compact JWS and return its claims.
///
/// Rejects bad signatures, expired or not-yet-valid tokens, issuer/audience
/// mismatches, non-HS256 algorithms, and unknown `kid`s. A token without a
/// `kid` is checked against the current key only.
///
/// # Errors
/// Returns the matching token-layer `Error`; see [`Error::code`] for how the
/// variants collapse on the wire.
pub fn verify(token: &str, ring: &KeyRing) -> Result<AccessClaims, Error> {
    let header = decode_header(token).map_err(|_| Error::Malformed)?;
    if header.alg != Algorithm::HS256 {
        return Err(Error::BadSignature);
    }

    let key = match header.kid.as_deref() {
        Some(kid) => ring
            .find(kid)
            .ok_or_else(|| Error::UnknownKid(kid.to_string()))?,
        None => ring.current(),
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY_SECONDS;
    validation.validate_nbf = true;
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(key.secret()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => Error::Expired,
        ErrorKind::InvalidSignature => Error::BadSignature,
        ErrorKind::ImmatureSignature => Error::NotYetValid,
        ErrorKind::InvalidIssuer => Error::InvalidIssuer,
        ErrorKind::InvalidAudience => Error::InvalidAudience,
        _ => Error::Malformed,
    })?;

    Ok(data.claims)
}
