//! The signature chain linking blocks back to the issuer's root key.
//!
//! Block 0 (the authority block) is signed by the root key. Every block
//! names a next key, and block `i` must be signed by the private half of
//! block `i - 1`'s next key. The signed message of a block is
//!
//! ```text
//! domain tag || leb128(len(contents)) || contents || next key || previous signature
//! ```
//!
//! where the previous signature is absent for the authority block and the
//! domain tag distinguishes authority blocks from attenuation blocks.

use cachet_credentials::{KeyPair, PublicKey, Signature};
use tracing::{debug, instrument, warn};

use crate::{Block, BlockContents, Error};

pub(crate) const AUTHORITY_TAG: &[u8] = b"cachet/authority/v1";
pub(crate) const BLOCK_TAG: &[u8] = b"cachet/block/v1";
pub(crate) const SEAL_TAG: &[u8] = b"cachet/seal/v1";

/// Builds the message a block's signature covers.
fn signed_payload(
    tag: &[u8],
    data: &[u8],
    next_key: &PublicKey,
    previous: Option<&Signature>,
) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::with_capacity(tag.len() + 10 + data.len() + 32 + 64);
    payload.extend_from_slice(tag);
    leb128::write::unsigned(&mut payload, data.len() as u64)
        .map_err(|error| Error::Encoding(error.to_string()))?;
    payload.extend_from_slice(data);
    payload.extend_from_slice(next_key.as_bytes());
    if let Some(previous) = previous {
        payload.extend_from_slice(previous.as_bytes());
    }
    Ok(payload)
}

/// The message a seal signature covers.
pub(crate) fn seal_payload(last: &Signature) -> Vec<u8> {
    [SEAL_TAG, last.as_bytes().as_slice()].concat()
}

/// Signs an authority block with the issuer's root key.
pub fn sign_authority(
    root: &KeyPair,
    contents: BlockContents,
    next_key: PublicKey,
) -> Result<Block, Error> {
    let data = contents.encode()?;
    let payload = signed_payload(AUTHORITY_TAG, &data, &next_key, None)?;
    Ok(Block {
        signature: root.sign(&payload),
        contents,
        data,
        next_key,
    })
}

/// Signs a block that follows `previous`.
///
/// `signer` must be the key pair whose public half is `previous`'s next key.
pub fn sign_next(
    previous: &Block,
    signer: &KeyPair,
    contents: BlockContents,
    next_key: PublicKey,
) -> Result<Block, Error> {
    if signer.public() != previous.next_key {
        return Err(Error::UnexpectedSigner);
    }
    let data = contents.encode()?;
    let payload = signed_payload(BLOCK_TAG, &data, &next_key, Some(&previous.signature))?;
    Ok(Block {
        signature: signer.sign(&payload),
        contents,
        data,
        next_key,
    })
}

/// Verifies every block front to back, failing at the first block whose
/// signature does not verify against the key its predecessor declared.
#[instrument(level = "debug", skip_all, fields(blocks = blocks.len()))]
pub fn verify_chain(blocks: &[Block], root: &PublicKey) -> Result<(), Error> {
    if blocks.is_empty() {
        return Err(Error::Malformed("token has no blocks".into()));
    }

    let mut expected = *root;
    let mut previous: Option<&Signature> = None;
    for (index, block) in blocks.iter().enumerate() {
        let tag = if index == 0 { AUTHORITY_TAG } else { BLOCK_TAG };
        let payload = signed_payload(tag, &block.data, &block.next_key, previous)?;
        if expected.verify(&payload, &block.signature).is_err() {
            warn!(index, "Block signature does not verify");
            return Err(Error::InvalidSignature { index });
        }
        debug!(index, identifier = %block.identifier(), "Block signature verified");
        expected = block.next_key;
        previous = Some(&block.signature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockBuilder;

    fn pair(seed: u8) -> KeyPair {
        KeyPair::from_seed(&[seed; 32])
    }

    #[test]
    fn a_single_block_verifies_against_the_root_alone() {
        let root = pair(1);
        let block = sign_authority(&root, BlockBuilder::new().build(), pair(2).public()).unwrap();
        verify_chain(&[block], &root.public()).unwrap();
    }

    #[test]
    fn it_refuses_to_sign_with_an_undeclared_key() {
        let root = pair(1);
        let authority =
            sign_authority(&root, BlockBuilder::new().build(), pair(2).public()).unwrap();
        let result = sign_next(&authority, &pair(3), BlockBuilder::new().build(), pair(4).public());
        assert!(matches!(result, Err(Error::UnexpectedSigner)));
    }

    #[test]
    fn it_rejects_a_chain_under_the_wrong_root() {
        let block =
            sign_authority(&pair(1), BlockBuilder::new().build(), pair(2).public()).unwrap();
        assert!(matches!(
            verify_chain(&[block], &pair(9).public()),
            Err(Error::InvalidSignature { index: 0 })
        ));
    }

    #[test]
    fn it_rejects_reordered_blocks() {
        let root = pair(1);
        let first = sign_authority(&root, BlockBuilder::new().build(), pair(2).public()).unwrap();
        let second =
            sign_next(&first, &pair(2), BlockBuilder::new().build(), pair(3).public()).unwrap();
        let third =
            sign_next(&second, &pair(3), BlockBuilder::new().build(), pair(4).public()).unwrap();

        verify_chain(&[first.clone(), second.clone(), third.clone()], &root.public()).unwrap();
        assert!(matches!(
            verify_chain(&[first, third, second], &root.public()),
            Err(Error::InvalidSignature { index: 1 })
        ));
    }

    #[test]
    fn an_empty_chain_is_malformed() {
        assert!(matches!(
            verify_chain(&[], &pair(1).public()),
            Err(Error::Malformed(_))
        ));
    }
}
