//! Ed25519 primitives for tonsig
//!
//! Every signature in the protocol is taken over a 32-byte cell hash, so the helpers here
//! only ever sign and verify hashes.

pub mod keys;
pub mod signature;

pub use keys::{PublicKey, SecretKey};
pub use signature::{sign_hash, verify_hash, Signature};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("embedded public key does not match the secret seed")]
    KeyMismatch,

    #[error("bytes are not a valid ed25519 public key")]
    InvalidPublicKey,

    #[error("signature verification failed")]
    VerificationFailed,
}
