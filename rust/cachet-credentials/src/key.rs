//! Ed25519 key pairs and public keys.

use std::fmt;
use std::str::FromStr;

use base58::{FromBase58, ToBase58};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{InvalidSignature, KeyError, Signature};

/// Length of a secret seed and of a public key.
pub const KEY_LENGTH: usize = 32;

/// Multicodec prefix of an Ed25519 public key in `did:key` form.
const MULTICODEC_ED25519: [u8; 2] = [0xed, 0x01];

/// An Ed25519 signing key together with its public half.
#[derive(Clone)]
pub struct KeyPair(SigningKey);

impl KeyPair {
    /// Generate a key pair from operating system randomness.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Rng`] if the operating system RNG fails.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = [0u8; KEY_LENGTH];
        getrandom::getrandom(&mut seed).map_err(KeyError::Rng)?;
        Ok(Self::from_seed(&seed))
    }

    /// Derive a key pair from a 32-byte secret seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; KEY_LENGTH]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Derive a key pair from a secret seed of unchecked length.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] unless `bytes` is 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// The secret seed.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// The public half, which verifies signatures made by [`KeyPair::sign`].
    #[must_use]
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign `message`. Ed25519 signing is deterministic, so the same key and
    /// message always produce the same signature.
    ///
    /// ```rust
    /// use cachet_credentials::KeyPair;
    ///
    /// let pair = KeyPair::from_seed(&[7; 32]);
    /// let signature = pair.sign(b"block");
    /// assert_eq!(signature, pair.sign(b"block"));
    /// assert!(pair.public().verify(b"block", &signature).is_ok());
    /// assert!(pair.public().verify(b"other", &signature).is_err());
    /// ```
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_bytes(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPair").field(&self.public()).finish()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for KeyPair {}

/// An Ed25519 public key.
///
/// Displays as a `did:key` identifier and parses back from one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Decode a compressed Edwards point.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] unless `bytes` is 32 bytes long,
    /// and [`KeyError::InvalidPublicKey`] if they are not a valid point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LENGTH,
            actual: bytes.len(),
        })?;
        VerifyingKey::from_bytes(&key)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH] {
        self.0.to_bytes()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// Verify `signature` over `message`, rejecting weak keys and
    /// non-canonical signatures.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSignature`] if the signature was not made over
    /// `message` by the private half of this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), InvalidSignature> {
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        self.0
            .verify_strict(message, &signature)
            .map_err(|_| InvalidSignature)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(MULTICODEC_ED25519.len() + KEY_LENGTH);
        raw.extend_from_slice(&MULTICODEC_ED25519);
        raw.extend_from_slice(self.as_bytes());
        write!(f, "did:key:z{}", raw.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix("did:key:")
            .ok_or(KeyError::Encoding("missing did:key header"))?
            .strip_prefix('z')
            .ok_or(KeyError::Encoding("missing base58 prefix 'z'"))?;
        let raw = encoded
            .from_base58()
            .map_err(|_| KeyError::Encoding("invalid base58"))?;
        let key = raw
            .strip_prefix(&MULTICODEC_ED25519[..])
            .ok_or(KeyError::Encoding("not an ed25519 key"))?;
        PublicKey::from_bytes(key)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::Bytes::new(self.as_bytes()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_derives_the_same_key_from_the_same_seed() {
        let first = KeyPair::from_seed(&[7; KEY_LENGTH]);
        let second = KeyPair::from_bytes(&[7; KEY_LENGTH]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.public(), second.public());
    }

    #[test]
    fn it_rejects_short_seeds() {
        assert!(matches!(
            KeyPair::from_bytes(&[1, 2, 3]),
            Err(KeyError::InvalidLength {
                expected: 32,
                actual: 3
            })
        ));
    }

    #[test]
    fn it_does_not_leak_the_secret_in_debug_output() {
        let pair = KeyPair::from_seed(&[9; KEY_LENGTH]);
        let debug = format!("{pair:?}");
        assert!(debug.starts_with("KeyPair(PublicKey(did:key:z"));
    }
}
