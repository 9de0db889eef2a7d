//! Tokens: issue, attenuate, seal, verify and serialize.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use cachet_credentials::{KeyPair, PublicKey, Signature};
use tracing::debug;

use crate::chain::{seal_payload, sign_authority, sign_next, verify_chain};
use crate::wire::{SerializedBlock, SerializedProof, SerializedToken, VERSION};
use crate::{Authorizer, Block, BlockBuilder, BlockContents, Error, RevocationId};

/// What the holder of a token can prove about its last block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof {
    /// The private half of the last block's next key. Whoever holds the
    /// token can append a block with it.
    NextSecret(KeyPair),
    /// A signature over the last block's signature, made with that key and
    /// then discarded. No further block can be appended.
    Sealed(Signature),
}

/// An ordered, signed sequence of blocks.
///
/// Tokens are values: [`Token::append`] and [`Token::seal`] return new
/// tokens and leave the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    blocks: Vec<Block>,
    proof: Proof,
}

impl Token {
    /// Issue a token whose authority block is signed by `root`.
    ///
    /// `next` becomes the key with which the first attenuation is signed.
    pub fn issue(root: &KeyPair, builder: BlockBuilder, next: KeyPair) -> Result<Self, Error> {
        let block = sign_authority(root, builder.build(), next.public())?;
        debug!(identifier = %block.identifier(), "Issued token");
        Ok(Self {
            blocks: vec![block],
            proof: Proof::NextSecret(next),
        })
    }

    /// Attenuate the token with a new block.
    ///
    /// The block is signed with the key carried by this token; `next` is the
    /// fresh key pair that will sign the block after it.
    pub fn append(&self, builder: BlockBuilder, next: KeyPair) -> Result<Self, Error> {
        let signer = match &self.proof {
            Proof::NextSecret(signer) => signer,
            Proof::Sealed(_) => return Err(Error::Sealed),
        };
        let block = sign_next(self.last(), signer, builder.build(), next.public())?;
        debug!(index = self.blocks.len(), identifier = %block.identifier(), "Appended block");

        let mut blocks = self.blocks.clone();
        blocks.push(block);
        Ok(Self {
            blocks,
            proof: Proof::NextSecret(next),
        })
    }

    /// Seal the token so that no further block can be appended.
    ///
    /// Sealing an already sealed token returns it unchanged.
    pub fn seal(&self) -> Self {
        match &self.proof {
            Proof::Sealed(_) => self.clone(),
            Proof::NextSecret(secret) => Self {
                blocks: self.blocks.clone(),
                proof: Proof::Sealed(secret.sign(&seal_payload(&self.last().signature))),
            },
        }
    }

    /// Whether the token was sealed and can no longer be attenuated.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        matches!(self.proof, Proof::Sealed(_))
    }

    /// The blocks in signing order, authority block first. Never empty.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    /// Revocation identifiers of every block, authority block first.
    pub fn identifiers(&self) -> Vec<RevocationId> {
        self.blocks.iter().map(Block::identifier).collect()
    }

    fn last(&self) -> &Block {
        // Tokens are only built through issue, append and decode, all of
        // which guarantee at least one block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Verify the signature chain against `root` and the proof against the
    /// last block.
    pub fn verify(&self, root: &PublicKey) -> Result<(), Error> {
        verify_chain(&self.blocks, root)?;
        let last = self.last();
        match &self.proof {
            Proof::NextSecret(secret) if secret.public() == last.next_key => Ok(()),
            Proof::Sealed(signature)
                if last
                    .next_key
                    .verify(&seal_payload(&last.signature), signature)
                    .is_ok() =>
            {
                Ok(())
            }
            _ => Err(Error::InvalidProof),
        }
    }

    /// Verify the token and start authorizing it.
    pub fn authorizer(&self, root: &PublicKey) -> Result<Authorizer, Error> {
        Authorizer::new(self.clone(), root)
    }

    /// Serialize to DAG-CBOR.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        serde_ipld_dagcbor::to_vec(&self.serialized())
            .map_err(|error| Error::Encoding(error.to_string()))
    }

    /// Decode a token.
    ///
    /// This proves structural well-formedness only. Call [`Token::verify`]
    /// (or build an [`Authorizer`]) before trusting its contents.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let serialized: SerializedToken =
            serde_ipld_dagcbor::from_slice(bytes).map_err(Error::malformed)?;
        if serialized.version != VERSION {
            return Err(Error::Malformed(format!(
                "unsupported version {}",
                serialized.version
            )));
        }
        let canonical = serde_ipld_dagcbor::to_vec(&serialized).map_err(Error::malformed)?;
        if canonical != bytes {
            return Err(Error::Malformed("non-canonical token encoding".into()));
        }
        if serialized.blocks.is_empty() {
            return Err(Error::Malformed("token has no blocks".into()));
        }

        let blocks = serialized
            .blocks
            .into_iter()
            .map(|block| {
                Ok(Block {
                    contents: BlockContents::decode(&block.data)?,
                    data: block.data,
                    next_key: block.next_key,
                    signature: block.signature,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let proof = match serialized.proof {
            SerializedProof::NextSecret(secret) => Proof::NextSecret(
                KeyPair::from_bytes(&secret).map_err(Error::malformed)?,
            ),
            SerializedProof::Sealed(signature) => Proof::Sealed(signature),
        };

        Ok(Self { blocks, proof })
    }

    /// Serialize to DAG-CBOR and encode as padded URL-safe base64.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if serialization fails.
    pub fn to_base64(&self) -> Result<String, Error> {
        Ok(URL_SAFE.encode(self.to_vec()?))
    }

    /// Decode a token produced by [`Token::to_base64`]. Surrounding
    /// whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `text` is not base64 or the bytes do
    /// not decode as described for [`Token::from_slice`].
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE.decode(text.trim()).map_err(Error::malformed)?;
        Self::from_slice(&bytes)
    }

    fn serialized(&self) -> SerializedToken {
        SerializedToken {
            version: VERSION,
            blocks: self
                .blocks
                .iter()
                .map(|block| SerializedBlock {
                    data: block.data.clone(),
                    next_key: block.next_key,
                    signature: block.signature,
                })
                .collect(),
            proof: match &self.proof {
                Proof::NextSecret(secret) => SerializedProof::NextSecret(secret.to_bytes().to_vec()),
                Proof::Sealed(signature) => SerializedProof::Sealed(*signature),
            },
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "// block {index}")?;
            write!(f, "{block}")?;
        }
        if self.is_sealed() {
            writeln!(f, "// sealed")?;
        }
        Ok(())
    }
}
