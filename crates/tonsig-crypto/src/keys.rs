//! Key representations

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::signature::{sign_hash, Signature};
use crate::CryptoError;

/// Raw 32-byte Ed25519 public key.
///
/// Registries hold keys as opaque bytes; the curve point is only decoded when a
/// signature has to be verified.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    pub const LENGTH: usize = PUBLIC_KEY_LENGTH;

    pub const fn new(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "public key",
                expected: "32",
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode the curve point
    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

impl From<[u8; PUBLIC_KEY_LENGTH]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Hex strings in config and exchange files
impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signing key
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Accepts a 32-byte seed, or 64 bytes of `seed || public key`.
    ///
    /// In the 64-byte form the public half has to match the one derived from the seed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(bytes);
                let key = Self::from_seed(&seed);
                seed.zeroize();
                Ok(key)
            }
            64 => {
                let (seed, public) = bytes.split_at(SECRET_KEY_LENGTH);
                let key = Self::from_slice(seed)?;
                if key.public_key().as_bytes().as_slice() != public {
                    return Err(CryptoError::KeyMismatch);
                }
                Ok(key)
            }
            actual => Err(CryptoError::InvalidLength {
                what: "secret key",
                expected: "32 or 64",
                actual,
            }),
        }
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(encoded.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Sign a 32-byte cell hash
    pub fn sign(&self, hash: &[u8; 32]) -> Signature {
        sign_hash(self, hash)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_hex_round_trip() {
        let key = SecretKey::from_seed(&[7u8; 32]).public_key();
        let parsed: PublicKey = key.to_hex().parse().unwrap();
        assert_eq!(parsed, key);
        assert!(PublicKey::from_hex("abcd").is_err());
        assert!(matches!(
            PublicKey::from_hex("zz"),
            Err(CryptoError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_public_key_serde_is_hex_string() {
        let key = PublicKey::new([0xab; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_secret_key_accepts_seed_or_keypair() {
        let seed = [3u8; 32];
        let from_seed = SecretKey::from_slice(&seed).unwrap();

        let mut keypair = seed.to_vec();
        keypair.extend_from_slice(from_seed.public_key().as_bytes());
        let from_pair = SecretKey::from_slice(&keypair).unwrap();
        assert_eq!(from_pair.public_key(), from_seed.public_key());

        keypair[40] ^= 1;
        assert_eq!(
            SecretKey::from_slice(&keypair).unwrap_err(),
            CryptoError::KeyMismatch
        );
        assert!(matches!(
            SecretKey::from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidLength { actual: 16, .. })
        ));
    }

    #[test]
    fn test_secret_key_debug_hides_seed() {
        let key = SecretKey::from_hex(&"11".repeat(32)).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&"11".repeat(32)));
        assert!(debug.contains(&key.public_key().to_hex()));
    }

    #[test]
    fn test_rfc8032_public_key() {
        // RFC 8032 section 7.1, test 1
        let key = SecretKey::from_hex(
            "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
        )
        .unwrap();
        assert_eq!(
            key.public_key().to_hex(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }
}
