//! Client side of SIP REGISTER with digest authentication.

use thiserror::Error;

pub mod auth;
pub mod message;
pub mod random;
pub mod registration;
pub mod transport;

pub use auth::{
    authorization_header, compute_digest_response, compute_ha1, compute_ha2, parse_auth_params,
    ChallengeFields, Credentials, DigestChallenge, DigestInputs, Qop, NONCE_COUNT,
};
pub use message::{header_value, parse_response, Header, Method, Request, Response};
pub use random::{RandomSource, ThreadRandom};
pub use registration::{
    build_register, register, DialogContext, RegisterConfig, Registered, RegistrationError,
    RegistrationSession, RegistrationState, Round,
};
pub use transport::{Transport, TransportError, UdpTransport};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SipError {
    #[error("invalid message: {0}")]
    Invalid(&'static str),
    #[error("message exceeds buffer capacity")]
    Capacity,
}

pub type Result<T> = std::result::Result<T, SipError>;
