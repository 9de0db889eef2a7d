//! Ed25519 key material for cachet tokens.
//!
//! Every block of a token is signed by a [`KeyPair`] and names the
//! [`PublicKey`] that must verify the block after it. Key pairs are always
//! supplied by the caller; this crate never generates one implicitly.

mod error;
mod key;
mod signature;

pub use error::{InvalidSignature, KeyError};
pub use key::{KEY_LENGTH, KeyPair, PublicKey};
pub use signature::{SIGNATURE_LENGTH, Signature};
