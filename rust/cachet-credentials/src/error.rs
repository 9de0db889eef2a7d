//! Error types for key material.

use thiserror::Error;

/// Errors from constructing, generating or parsing keys and signatures.
#[derive(Debug, Clone, Error)]
pub enum KeyError {
    /// The key or signature bytes have the wrong length.
    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// The bytes do not encode a valid Ed25519 public key.
    #[error("Invalid Ed25519 public key")]
    InvalidPublicKey,

    /// The textual form of a public key could not be decoded.
    #[error("Invalid public key encoding: {0}")]
    Encoding(&'static str),

    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),
}

/// A signature did not verify against the given public key and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Signature verification failed")]
pub struct InvalidSignature;
