//! Cachet tokens
//!
//! A token is a chain of signed [`Block`]s. The first block is signed by the
//! issuer's root key; every later block is signed with a key pair whose
//! public half the previous block declared, so any holder can attenuate a
//! token offline by appending restrictions. An [`Authorizer`] verifies the
//! chain, consults a [`RevocationRegistry`] and evaluates the Datalog carried
//! by the blocks together with runtime context to reach a [`Verdict`].
//!
//! ```rust
//! # tokio_test(async {
//! use cachet_token::{BlockBuilder, KeyPair, NoRevocations, Token};
//!
//! let root = KeyPair::from_seed(&[1; 32]);
//! let token = Token::issue(
//!     &root,
//!     BlockBuilder::new().code(r#"user("admin")"#)?,
//!     KeyPair::from_seed(&[2; 32]),
//! )?;
//!
//! let mut authorizer = token.authorizer(&root.public())?;
//! authorizer.add_code(r#"operation("create"); allow if user("admin")"#)?;
//! assert!(authorizer.authorize(&NoRevocations).await?.is_allowed());
//! # Ok::<(), cachet_token::Error>(())
//! # });
//! # fn tokio_test<F: std::future::Future>(future: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
//! # }
//! ```

mod authorizer;
mod block;
mod chain;
mod error;
mod revocation;
mod token;
mod wire;

pub use authorizer::{
    Authorizer, AuthorizerConfig, AuthorizerState, CheckOrigin, Denial, FactScope, FailedCheck,
    Verdict,
};
pub use block::{Block, BlockBuilder, BlockContents};
pub use chain::{sign_authority, sign_next, verify_chain};
pub use error::{Error, ErrorKind};
pub use revocation::{
    MemoryRevocationRegistry, NoRevocations, REVOCATION_ID_SIZE, RevocationId, RevocationRegistry,
};
pub use token::{Proof, Token};

pub use cachet_credentials::{KeyPair, PublicKey, Signature};
pub use cachet_datalog::{Check, Fact, Policy, Rule, RunLimits};
