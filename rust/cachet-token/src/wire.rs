//! DAG-CBOR wire representation of a token.

use cachet_credentials::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Current wire format version.
pub(crate) const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SerializedToken {
    pub version: u32,
    pub blocks: Vec<SerializedBlock>,
    pub proof: SerializedProof,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SerializedBlock {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub next_key: PublicKey,
    pub signature: Signature,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum SerializedProof {
    /// Secret seed of the last block's next key.
    NextSecret(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Seal signature made with that key.
    Sealed(Signature),
}
