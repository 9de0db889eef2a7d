//! Error types for token construction, verification and authorization.
//!
//! Every failure is an [`Error`]; [`Error::kind`] classifies it into an
//! [`ErrorKind`] so callers can tell hard failures (bad signatures, corrupt
//! bytes, revoked blocks) apart from an ordinary denial.

use cachet_credentials::KeyError;
use cachet_datalog::{EvaluationError, SyntaxError};
use serde::Serialize;
use thiserror::Error;

use crate::{Denial, RevocationId};

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Statement text or structure is malformed.
    Syntax,
    /// Serialized token bytes are corrupt, truncated or non-canonical.
    Malformed,
    /// The signature chain or the token proof does not verify.
    InvalidSignature,
    /// Append was attempted on a sealed token.
    Sealed,
    /// The fixpoint did not converge within its bounds.
    EvaluationLimitExceeded,
    /// A block of the token is revoked.
    Revoked,
    /// Checks or policies rejected the request.
    Denied,
    /// The revocation registry could not answer.
    Registry,
    /// Key material could not be generated or decoded.
    Key,
    /// The authorizer was used out of order.
    InvalidState,
}

/// Errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A statement failed to parse or validate.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Token bytes could not be decoded.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// A block could not be encoded for signing.
    #[error("Failed to encode block: {0}")]
    Encoding(String),

    /// Block `index` is not signed by the key its predecessor declared.
    #[error("Invalid signature on block {index}")]
    InvalidSignature {
        /// Position of the first block that failed to verify.
        index: usize,
    },

    /// The key offered for signing is not the one the previous block declared.
    #[error("Signing key does not match the next key of the previous block")]
    UnexpectedSigner,

    /// The proof attached to the token does not match its last block.
    #[error("Token proof does not match its last block")]
    InvalidProof,

    /// The token is sealed and cannot be attenuated.
    #[error("Token is sealed")]
    Sealed,

    /// Evaluation exceeded its limits.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Block `index` is revoked.
    #[error("Block {index} is revoked ({identifier})")]
    Revoked {
        /// Position of the revoked block.
        index: usize,
        /// Its revocation identifier.
        identifier: RevocationId,
    },

    /// The revocation registry returned an error.
    #[error("Revocation lookup failed: {0}")]
    Registry(String),

    /// The request was denied.
    #[error("Denied: {0}")]
    Denied(Denial),

    /// A verdict has already been produced.
    #[error("Authorizer already produced a verdict")]
    AlreadyAuthorized,

    /// No verdict has been produced yet.
    #[error("Authorizer has not produced a verdict")]
    NotAuthorized,

    /// Key material error.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::Malformed(_) | Error::Encoding(_) => ErrorKind::Malformed,
            Error::InvalidSignature { .. } | Error::UnexpectedSigner | Error::InvalidProof => {
                ErrorKind::InvalidSignature
            }
            Error::Sealed => ErrorKind::Sealed,
            Error::Evaluation(_) => ErrorKind::EvaluationLimitExceeded,
            Error::Revoked { .. } => ErrorKind::Revoked,
            Error::Registry(_) => ErrorKind::Registry,
            Error::Denied(_) => ErrorKind::Denied,
            Error::AlreadyAuthorized | Error::NotAuthorized => ErrorKind::InvalidState,
            Error::Key(_) => ErrorKind::Key,
        }
    }

    pub(crate) fn malformed(error: impl std::fmt::Display) -> Self {
        Error::Malformed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_classifies_chain_failures_as_invalid_signatures() {
        assert_eq!(
            Error::InvalidSignature { index: 2 }.kind(),
            ErrorKind::InvalidSignature
        );
        assert_eq!(Error::InvalidProof.kind(), ErrorKind::InvalidSignature);
        assert_eq!(Error::UnexpectedSigner.kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn it_classifies_evaluation_limits() {
        let error = Error::from(EvaluationError::IterationLimit { limit: 4 });
        assert_eq!(error.kind(), ErrorKind::EvaluationLimitExceeded);
    }

    #[test]
    fn error_kinds_serialize_as_codes() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::EvaluationLimitExceeded).unwrap(),
            r#""EVALUATION_LIMIT_EXCEEDED""#
        );
    }
}
