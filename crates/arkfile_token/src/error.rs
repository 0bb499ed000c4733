use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("failed to encode token")]
    Encode,
    #[error("failed to load signing keys: {0}")]
    KeyLoad(String),
}

impl Error {
    /// Stable machine-readable code for HTTP error bodies.
    ///
    /// The wire contract only distinguishes four token failures; the finer
    /// variants all collapse into `Malformed` so responses never leak which
    /// claim check tripped.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MissingToken",
            Self::BadSignature => "BadSignature",
            Self::Expired => "Expired",
            Self::KeyLoad(_) => "KeyLoadError",
            _ => "Malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn codes_collapse_claim_failures() {
        assert_eq!(Error::MissingToken.code(), "MissingToken");
        assert_eq!(Error::BadSignature.code(), "BadSignature");
        assert_eq!(Error::Expired.code(), "Expired");
        assert_eq!(Error::Malformed.code(), "Malformed");
        assert_eq!(Error::NotYetValid.code(), "Malformed");
        assert_eq!(Error::InvalidIssuer.code(), "Malformed");
        assert_eq!(Error::InvalidAudience.code(), "Malformed");
        assert_eq!(Error::UnknownKid("k1".to_string()).code(), "Malformed");
    }
}
