//! Revocation identifiers and the registry that answers for them.
//!
//! Every block has a [`RevocationId`]: the BLAKE3 digest of its signature.
//! Revoking a block's identifier makes every token that contains that block
//! fail authorization. Revoking the authority block therefore revokes the
//! whole lineage, while revoking a later block leaves its ancestors usable.

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::future::{Future, ready};
use std::hash::BuildHasher;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use cachet_credentials::Signature;
use parking_lot::RwLock;

use crate::Error;

/// The size of a revocation identifier in bytes.
pub const REVOCATION_ID_SIZE: usize = 32;

/// A deterministic digest of a block signature.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevocationId([u8; REVOCATION_ID_SIZE]);

impl RevocationId {
    /// The identifier of the block carrying `signature`.
    pub fn of(signature: &Signature) -> Self {
        Self(blake3::hash(signature.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; REVOCATION_ID_SIZE] {
        &self.0
    }
}

impl From<[u8; REVOCATION_ID_SIZE]> for RevocationId {
    fn from(bytes: [u8; REVOCATION_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RevocationId {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        bytes.try_into().map(Self).map_err(|_| {
            Error::Malformed(format!(
                "revocation identifier must be {REVOCATION_ID_SIZE} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

impl fmt::Display for RevocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE.encode(self.0))
    }
}

impl fmt::Debug for RevocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevocationId({self})")
    }
}

impl FromStr for RevocationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = URL_SAFE.decode(s).map_err(Error::malformed)?;
        RevocationId::try_from(bytes.as_slice())
    }
}

/// Answers whether a block identifier has been revoked.
///
/// The authorizer awaits one lookup per block before it evaluates anything,
/// and stops at the first identifier reported as revoked. A lookup error is
/// treated as a failure to authorize.
pub trait RevocationRegistry {
    /// Error returned when a lookup cannot be answered.
    type Error: std::error::Error;

    /// Whether `identifier` is revoked.
    fn is_revoked(
        &self,
        identifier: &RevocationId,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}

impl<S: BuildHasher> RevocationRegistry for HashSet<RevocationId, S> {
    type Error = Infallible;

    fn is_revoked(
        &self,
        identifier: &RevocationId,
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        ready(Ok(self.contains(identifier)))
    }
}

impl<S: BuildHasher> RevocationRegistry for Arc<RwLock<HashSet<RevocationId, S>>> {
    type Error = Infallible;

    fn is_revoked(
        &self,
        identifier: &RevocationId,
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        ready(Ok(self.read().contains(identifier)))
    }
}

/// A registry with nothing revoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRevocations;

impl RevocationRegistry for NoRevocations {
    type Error = Infallible;

    fn is_revoked(
        &self,
        _identifier: &RevocationId,
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        ready(Ok(false))
    }
}

/// A shareable in-memory registry.
///
/// Clones share the same set, so an operator handle can revoke identifiers
/// while authorizers elsewhere consult it.
#[derive(Debug, Clone, Default)]
pub struct MemoryRevocationRegistry {
    revoked: Arc<RwLock<HashSet<RevocationId>>>,
}

impl MemoryRevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `identifier`. Returns `false` if it was already revoked.
    pub fn revoke(&self, identifier: RevocationId) -> bool {
        self.revoked.write().insert(identifier)
    }

    /// Lift the revocation of `identifier`. Returns `false` if it was not
    /// revoked.
    pub fn restore(&self, identifier: &RevocationId) -> bool {
        self.revoked.write().remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }
}

impl RevocationRegistry for MemoryRevocationRegistry {
    type Error = Infallible;

    fn is_revoked(
        &self,
        identifier: &RevocationId,
    ) -> impl Future<Output = Result<bool, Self::Error>> {
        self.revoked.is_revoked(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_credentials::KeyPair;

    fn identifier(seed: u8) -> RevocationId {
        RevocationId::of(&KeyPair::from_seed(&[seed; 32]).sign(b"block"))
    }

    #[test]
    fn identifiers_round_trip_through_text() {
        let id = identifier(1);
        let text = id.to_string();
        assert_eq!(text.parse::<RevocationId>().unwrap(), id);
        assert!("not base64!".parse::<RevocationId>().is_err());
        assert!("AAAA".parse::<RevocationId>().is_err());
    }

    #[tokio::test]
    async fn memory_registry_is_shared_between_clones() {
        let registry = MemoryRevocationRegistry::new();
        let handle = registry.clone();
        let id = identifier(2);

        assert!(!registry.is_revoked(&id).await.unwrap());
        assert!(handle.revoke(id));
        assert!(registry.is_revoked(&id).await.unwrap());
        assert!(handle.restore(&id));
        assert!(!registry.is_revoked(&id).await.unwrap());
    }

    #[tokio::test]
    async fn plain_sets_are_registries() {
        let id = identifier(3);
        let set = HashSet::from([id]);
        assert!(set.is_revoked(&id).await.unwrap());
        assert!(!NoRevocations.is_revoked(&id).await.unwrap());
    }
}
