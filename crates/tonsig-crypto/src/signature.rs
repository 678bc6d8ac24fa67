//! Signature operations

use std::fmt;

use ed25519_dalek::SIGNATURE_LENGTH;
use serde::{Deserialize, Serialize};
use signature::{Signer, Verifier};

use crate::keys::{PublicKey, SecretKey};
use crate::CryptoError;

/// Detached 64-byte Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub const LENGTH: usize = SIGNATURE_LENGTH;

    pub const fn new(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "signature",
                expected: "64",
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; SIGNATURE_LENGTH]> for Signature {
    fn from(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Sign a 32-byte hash with a secret key
pub fn sign_hash(key: &SecretKey, hash: &[u8; 32]) -> Signature {
    let sig: ed25519_dalek::Signature = key.signing_key().sign(hash);
    Signature(sig.to_bytes())
}

/// Verify a signature over a 32-byte hash
pub fn verify_hash(
    key: &PublicKey,
    hash: &[u8; 32],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key = key.verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key
        .verify(hash, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}
