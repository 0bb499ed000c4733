//! `OPAQUE` protocol driver.
//!
//! The engine owns the server's long-term `OPAQUE` material (a `ServerSetup`
//! rebuilt deterministically from the on-disk seed, so persisted records
//! survive restarts) and exposes the protocol rounds as stateless
//! operations: every transient value travels in the arguments and return
//! values, the server keeps nothing between rounds.
//!
//! The registration and login endpoints receive the password in the request
//! body over TLS and drive both protocol roles in-process through the
//! one-shot [`OpaqueEngine::register`] and [`OpaqueEngine::login`] drivers.
//! The split per-round operations exist for protocol-level callers and
//! tests, and keep the wire behavior pinned down round by round.

use argon2::Argon2;
use opaque_ke::{
    CipherSuite, ClientLogin, ClientLoginFinishParameters, ClientRegistration,
    ClientRegistrationFinishParameters, CredentialFinalization, CredentialRequest,
    CredentialResponse, Identifiers, RegistrationRequest, RegistrationResponse,
    RegistrationUpload, ServerLogin, ServerLoginStartParameters, ServerRegistration, ServerSetup,
    errors::ProtocolError, key_exchange::tripledh::TripleDh,
};
use rand::{SeedableRng, rngs::OsRng};
use rand_chacha::ChaCha20Rng;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Cipher suite shared by both protocol roles. Changing any component
/// invalidates every persisted registration record.
pub struct OpaqueSuite;

impl CipherSuite for OpaqueSuite {
    type OprfCs = opaque_ke::Ristretto255;
    type KeGroup = opaque_ke::Ristretto255;
    type KeyExchange = TripleDh;
    type Ksf = Argon2<'static>;
}

#[derive(Debug, Error)]
pub enum PakeError {
    /// MAC/AKE rejection: wrong password or mismatched record. The only
    /// recoverable outcome; the caller reports it as bad credentials.
    #[error("credential exchange rejected")]
    BadCredentials,
    /// Any other cryptographic deviation (bad scalar, point not on curve,
    /// serialization mismatch). Terminal for the exchange; the client must
    /// restart from round one.
    #[error("pake protocol failure")]
    Protocol,
}

fn map_protocol(err: ProtocolError) -> PakeError {
    match err {
        ProtocolError::InvalidLoginError => PakeError::BadCredentials,
        _ => PakeError::Protocol,
    }
}

/// Client-derivable export key, identical across registrations with the same
/// password. Seeds the per-login session key; wiped on drop.
#[derive(ZeroizeOnDrop)]
pub struct ExportKey(Vec<u8>);

impl ExportKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub struct OpaqueEngine {
    server_setup: ServerSetup<OpaqueSuite>,
    server_id: Vec<u8>,
}

impl OpaqueEngine {
    /// Rebuild the server's long-term key pair from its 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32], server_id: String) -> Self {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let server_setup = ServerSetup::<OpaqueSuite>::new(&mut rng);
        Self {
            server_setup,
            server_id: server_id.into_bytes(),
        }
    }

    #[must_use]
    pub fn server_id(&self) -> &[u8] {
        &self.server_id
    }

    fn identifiers<'a>(&'a self, email: &'a str) -> Identifiers<'a> {
        Identifiers {
            client: Some(email.as_bytes()),
            server: Some(&self.server_id),
        }
    }

    // Registration, round one (client role).
    pub fn create_registration_request(
        password: &[u8],
    ) -> Result<
        (
            ClientRegistration<OpaqueSuite>,
            RegistrationRequest<OpaqueSuite>,
        ),
        PakeError,
    > {
        let mut rng = OsRng;
        let start =
            ClientRegistration::<OpaqueSuite>::start(&mut rng, password).map_err(map_protocol)?;
        Ok((start.state, start.message))
    }

    // Registration, round one (server role). Stateless: the response carries
    // everything the server needs back.
    pub fn create_registration_response(
        &self,
        message: RegistrationRequest<OpaqueSuite>,
        email: &str,
    ) -> Result<RegistrationResponse<OpaqueSuite>, PakeError> {
        let start = ServerRegistration::start(&self.server_setup, message, email.as_bytes())
            .map_err(map_protocol)?;
        Ok(start.message)
    }

    // Registration, round two (client role). Yields the upload for the
    // server and the export key, which only the client role ever sees.
    pub fn finalize_registration(
        &self,
        state: ClientRegistration<OpaqueSuite>,
        response: RegistrationResponse<OpaqueSuite>,
        email: &str,
        password: &[u8],
    ) -> Result<(RegistrationUpload<OpaqueSuite>, ExportKey), PakeError> {
        let mut rng = OsRng;
        let ksf = Argon2::default();
        let params = ClientRegistrationFinishParameters::new(self.identifiers(email), Some(&ksf));
        let finish = state
            .finish(&mut rng, password, response, params)
            .map_err(map_protocol)?;
        Ok((finish.message, ExportKey(finish.export_key.to_vec())))
    }

    /// Produce the persisted registration record from the client's upload.
    #[must_use]
    pub fn store_record(upload: RegistrationUpload<OpaqueSuite>) -> Vec<u8> {
        ServerRegistration::finish(upload).serialize().to_vec()
    }

    /// One-shot registration driving both roles in-process.
    pub fn register(&self, email: &str, password: &[u8]) -> Result<(Vec<u8>, ExportKey), PakeError> {
        let (state, message) = Self::create_registration_request(password)?;
        let response = self.create_registration_response(message, email)?;
        let (upload, export_key) = self.finalize_registration(state, response, email, password)?;
        Ok((Self::store_record(upload), export_key))
    }

    // Login, round one (client role).
    pub fn create_credential_request(
        password: &[u8],
    ) -> Result<(ClientLogin<OpaqueSuite>, CredentialRequest<OpaqueSuite>), PakeError> {
        let mut rng = OsRng;
        let start = ClientLogin::<OpaqueSuite>::start(&mut rng, password).map_err(map_protocol)?;
        Ok((start.state, start.message))
    }

    // Login, round one (server role). `record` is `None` for unknown
    // identifiers: the exchange still runs so the response shape and timing
    // do not reveal whether the account exists; the client-side finish then
    // fails exactly like a wrong password.
    pub fn create_credential_response(
        &self,
        request: CredentialRequest<OpaqueSuite>,
        email: &str,
        record: Option<&[u8]>,
    ) -> Result<(ServerLogin<OpaqueSuite>, CredentialResponse<OpaqueSuite>), PakeError> {
        let password_file = match record {
            Some(bytes) => {
                Some(ServerRegistration::deserialize(bytes).map_err(map_protocol)?)
            }
            None => None,
        };
        let mut rng = OsRng;
        let params = ServerLoginStartParameters {
            context: None,
            identifiers: self.identifiers(email),
        };
        let start = ServerLogin::start(
            &mut rng,
            &self.server_setup,
            password_file,
            request,
            email.as_bytes(),
            params,
        )
        .map_err(map_protocol)?;
        Ok((start.state, start.message))
    }

    // Login, round two (client role). Recovers the session key, the client
    // authenticator, and the export key; fails on a wrong password.
    pub fn recover_credentials(
        &self,
        state: ClientLogin<OpaqueSuite>,
        response: CredentialResponse<OpaqueSuite>,
        email: &str,
        password: &[u8],
    ) -> Result<(CredentialFinalization<OpaqueSuite>, Vec<u8>, ExportKey), PakeError> {
        let ksf = Argon2::default();
        let params = ClientLoginFinishParameters::new(None, self.identifiers(email), Some(&ksf));
        let finish = state
            .finish(password, response, params)
            .map_err(map_protocol)?;
        Ok((
            finish.message,
            finish.session_key.to_vec(),
            ExportKey(finish.export_key.to_vec()),
        ))
    }

    /// Login, final server check: verify the client authenticator and
    /// surface the server-side session key.
    pub fn user_auth(
        server_state: ServerLogin<OpaqueSuite>,
        finalization: CredentialFinalization<OpaqueSuite>,
    ) -> Result<Vec<u8>, PakeError> {
        let finish = server_state.finish(finalization).map_err(map_protocol)?;
        Ok(finish.session_key.to_vec())
    }

    /// One-shot login driving both roles in-process.
    ///
    /// Succeeds only when the client authenticator verifies and both sides
    /// agree on the session key; returns the export key that seeds the
    /// per-login session key.
    pub fn login(
        &self,
        email: &str,
        password: &[u8],
        record: Option<&[u8]>,
    ) -> Result<ExportKey, PakeError> {
        let (client_state, request) = Self::create_credential_request(password)?;
        let (server_state, response) = self.create_credential_response(request, email, record)?;
        let (finalization, mut client_key, export_key) =
            self.recover_credentials(client_state, response, email, password)?;
        let mut server_key = Self::user_auth(server_state, finalization)?;

        let agree = client_key.ct_eq(&server_key);
        client_key.zeroize();
        server_key.zeroize();
        if !bool::from(agree) {
            return Err(PakeError::Protocol);
        }
        Ok(export_key)
    }
}
