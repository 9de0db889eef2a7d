//! The authorizer: turns a verified token plus runtime context into a verdict.
//!
//! An [`Authorizer`] moves through [`AuthorizerState`]s:
//!
//! ```text
//! Built -> FactsLoaded -> Evaluated -> { Allowed, Denied, Failed }
//! ```
//!
//! [`Authorizer::authorize`] runs, in order:
//!
//! 1. one revocation lookup per block, stopping at the first revoked block;
//! 2. the fixpoint over authorizer and authority facts and rules, then one
//!    per attenuation block, scoped by [`FactScope`];
//! 3. every block check in block order, then every authorizer check,
//!    stopping at the first that fails;
//! 4. policies in the order they were added, the first match deciding.
//!
//! If no policy matches, the request is denied.

use std::fmt;

use cachet_credentials::PublicKey;
use cachet_datalog::{
    Check, Fact, FactSet, Policy, PolicyKind, Rule, RunLimits, Statement, evaluate,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{Error, RevocationRegistry, Token};

/// Which facts the checks of an attenuation block are evaluated against.
///
/// Under either scope, authority checks, authorizer checks and policies see
/// only the authority block and the authorizer, so appending a block can
/// never satisfy a check or policy that the token failed before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactScope {
    /// A block's checks see the authority block, the authorizer and the
    /// block itself.
    #[default]
    Authority,
    /// A block's checks also see every attenuation block before it.
    Preceding,
}

/// Authorizer configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizerConfig {
    pub limits: RunLimits,
    pub scope: FactScope,
}

/// Lifecycle of an [`Authorizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizerState {
    /// The token verified; no runtime context has been added.
    Built,
    /// Runtime facts, rules, checks or policies have been added.
    FactsLoaded,
    /// The closure has been computed; checks and policies are pending.
    Evaluated,
    /// A policy allowed the request.
    Allowed,
    /// A check or policy denied the request.
    Denied,
    /// Authorization failed with an error.
    Failed,
}

impl AuthorizerState {
    fn is_final(&self) -> bool {
        matches!(
            self,
            AuthorizerState::Allowed | AuthorizerState::Denied | AuthorizerState::Failed
        )
    }
}

/// Where a check was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOrigin {
    /// In the token block at this index.
    Block(usize),
    /// Added to the authorizer.
    Authorizer,
}

/// A check that was not satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub origin: CheckOrigin,
    /// Position of the check within its origin.
    pub index: usize,
    pub check: Check,
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The first check that failed.
    FailedCheck(FailedCheck),
    /// A deny policy matched.
    Policy { index: usize, policy: Policy },
    /// No policy matched.
    NoMatchingPolicy,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::FailedCheck(FailedCheck {
                origin: CheckOrigin::Block(block),
                index,
                check,
            }) => write!(f, "check {index} of block {block} failed: {check}"),
            Denial::FailedCheck(FailedCheck {
                origin: CheckOrigin::Authorizer,
                index,
                check,
            }) => write!(f, "authorizer check {index} failed: {check}"),
            Denial::Policy { index, policy } => write!(f, "policy {index} matched: {policy}"),
            Denial::NoMatchingPolicy => f.write_str("no policy matched"),
        }
    }
}

/// The outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An allow policy matched.
    Allowed { index: usize, policy: Policy },
    /// The request was rejected by a check or policy.
    Denied(Denial),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed { .. })
    }

    /// Turn a denial into [`Error::Denied`], returning the index of the
    /// matching allow policy otherwise.
    pub fn into_result(self) -> Result<usize, Error> {
        match self {
            Verdict::Allowed { index, .. } => Ok(index),
            Verdict::Denied(denial) => Err(Error::Denied(denial)),
        }
    }
}

/// Evaluates a verified token against runtime context.
#[derive(Debug, Clone)]
pub struct Authorizer {
    token: Token,
    config: AuthorizerConfig,
    facts: Vec<Fact>,
    rules: Vec<Rule>,
    checks: Vec<Check>,
    policies: Vec<Policy>,
    state: AuthorizerState,
    closure: Option<FactSet>,
}

impl Authorizer {
    /// Verify `token` against `root` and create an authorizer for it.
    pub fn new(token: Token, root: &PublicKey) -> Result<Self, Error> {
        token.verify(root)?;
        Ok(Self {
            token,
            config: AuthorizerConfig::default(),
            facts: Vec::new(),
            rules: Vec::new(),
            checks: Vec::new(),
            policies: Vec::new(),
            state: AuthorizerState::Built,
            closure: None,
        })
    }

    pub fn with_config(mut self, config: AuthorizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    pub fn state(&self) -> AuthorizerState {
        self.state
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    fn loading(&mut self) -> Result<&mut Self, Error> {
        if self.state.is_final() {
            return Err(Error::AlreadyAuthorized);
        }
        self.state = AuthorizerState::FactsLoaded;
        Ok(self)
    }

    pub fn add_fact(&mut self, fact: Fact) -> Result<&mut Self, Error> {
        let this = self.loading()?;
        this.facts.push(fact);
        Ok(this)
    }

    pub fn add_rule(&mut self, rule: Rule) -> Result<&mut Self, Error> {
        let this = self.loading()?;
        this.rules.push(rule);
        Ok(this)
    }

    pub fn add_check(&mut self, check: Check) -> Result<&mut Self, Error> {
        let this = self.loading()?;
        this.checks.push(check);
        Ok(this)
    }

    /// Policies are evaluated in the order they are added.
    pub fn add_policy(&mut self, policy: Policy) -> Result<&mut Self, Error> {
        let this = self.loading()?;
        this.policies.push(policy);
        Ok(this)
    }

    /// Parse `source` and add every statement in it.
    pub fn add_code(&mut self, source: &str) -> Result<&mut Self, Error> {
        let statements = Statement::parse_all(source)?;
        let this = self.loading()?;
        for statement in statements {
            match statement {
                Statement::Fact(fact) => this.facts.push(fact),
                Statement::Rule(rule) => this.rules.push(rule),
                Statement::Check(check) => this.checks.push(check),
                Statement::Policy(policy) => this.policies.push(policy),
            }
        }
        Ok(this)
    }

    /// Run revocation lookups, checks and policies.
    ///
    /// A denial is returned as `Ok(Verdict::Denied(..))`; every `Err` is a
    /// hard failure and must be treated as not authorized.
    #[instrument(level = "debug", skip_all, fields(blocks = self.token.blocks().len()))]
    pub async fn authorize<R: RevocationRegistry>(
        &mut self,
        registry: &R,
    ) -> Result<Verdict, Error> {
        if self.state.is_final() {
            return Err(Error::AlreadyAuthorized);
        }

        let result = self.run(registry).await;
        self.state = match &result {
            Ok(Verdict::Allowed { .. }) => AuthorizerState::Allowed,
            Ok(Verdict::Denied(_)) => AuthorizerState::Denied,
            Err(_) => AuthorizerState::Failed,
        };
        result
    }

    async fn run<R: RevocationRegistry>(&mut self, registry: &R) -> Result<Verdict, Error> {
        for (index, identifier) in self.token.identifiers().into_iter().enumerate() {
            let revoked = registry
                .is_revoked(&identifier)
                .await
                .map_err(|error| Error::Registry(error.to_string()))?;
            if revoked {
                warn!(index, %identifier, "Token block is revoked");
                return Err(Error::Revoked { index, identifier });
            }
        }

        let closures = self.closures()?;
        self.state = AuthorizerState::Evaluated;
        let limits = &self.config.limits;
        let authority = closures
            .first()
            .ok_or_else(|| Error::Malformed("token has no blocks".into()))?;

        let blocks = self.token.blocks().iter().zip(&closures);
        for (block_index, (block, closure)) in blocks.enumerate() {
            for (index, check) in block.contents().checks().iter().enumerate() {
                if !check.is_satisfied(closure, limits)? {
                    debug!(block = block_index, index, %check, "Check failed");
                    self.closure = Some(authority.clone());
                    return Ok(Verdict::Denied(Denial::FailedCheck(FailedCheck {
                        origin: CheckOrigin::Block(block_index),
                        index,
                        check: check.clone(),
                    })));
                }
            }
        }

        for (index, check) in self.checks.iter().enumerate() {
            if !check.is_satisfied(authority, limits)? {
                debug!(index, %check, "Authorizer check failed");
                self.closure = Some(authority.clone());
                return Ok(Verdict::Denied(Denial::FailedCheck(FailedCheck {
                    origin: CheckOrigin::Authorizer,
                    index,
                    check: check.clone(),
                })));
            }
        }

        let mut verdict = None;
        for (index, policy) in self.policies.iter().enumerate() {
            if policy.matches(authority, limits)? {
                debug!(index, %policy, "Policy matched");
                let policy = policy.clone();
                verdict = Some(match policy.kind() {
                    PolicyKind::Allow => Verdict::Allowed { index, policy },
                    PolicyKind::Deny => Verdict::Denied(Denial::Policy { index, policy }),
                });
                break;
            }
        }

        self.closure = Some(authority.clone());
        Ok(verdict.unwrap_or_else(|| {
            debug!("No policy matched");
            Verdict::Denied(Denial::NoMatchingPolicy)
        }))
    }

    /// One closure per block.
    ///
    /// The first is computed from the authorizer and the authority block and
    /// answers authority checks, authorizer checks and policies. The closure
    /// of an attenuation block adds that block's facts and rules, plus those
    /// of the attenuation blocks before it under [`FactScope::Preceding`].
    /// Facts and rules of a block never reach a check declared before it.
    fn closures(&self) -> Result<Vec<FactSet>, Error> {
        let blocks = self.token.blocks();
        let limits = &self.config.limits;

        let mut facts: FactSet = self.facts.iter().cloned().collect();
        let mut rules = self.rules.clone();
        if let Some(authority) = blocks.first() {
            facts.extend(authority.contents().facts().iter().cloned());
            rules.extend(authority.contents().rules().iter().cloned());
        }
        let mut closures = vec![evaluate(facts.clone(), &rules, limits)?];

        let mut scoped_facts = facts.clone();
        let mut scoped_rules = rules.clone();
        for block in blocks.iter().skip(1) {
            if self.config.scope == FactScope::Authority {
                scoped_facts = facts.clone();
                scoped_rules = rules.clone();
            }
            scoped_facts.extend(block.contents().facts().iter().cloned());
            scoped_rules.extend(block.contents().rules().iter().cloned());
            closures.push(evaluate(scoped_facts.clone(), &scoped_rules, limits)?);
        }

        debug!(scope = ?self.config.scope, closures = closures.len(), "Computed closures");
        Ok(closures)
    }

    /// Apply `rule` to the closure computed by [`Authorizer::authorize`].
    pub fn query(&self, rule: &Rule) -> Result<Vec<Fact>, Error> {
        let closure = self.closure.as_ref().ok_or(Error::NotAuthorized)?;
        let results: FactSet = rule.apply(closure, &self.config.limits)?.into_iter().collect();
        Ok(results.iter().cloned().collect())
    }

    /// Parse and run a query rule, e.g. `data($x) <- right($x, "read")`.
    pub fn query_code(&self, source: &str) -> Result<Vec<Fact>, Error> {
        let rule: Rule = source.parse()?;
        self.query(&rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockBuilder;
    use cachet_credentials::KeyPair;

    #[test]
    fn denials_name_the_failing_statement() {
        let check: Check = r#"check if operation("read")"#.parse().unwrap();
        let denial = Denial::FailedCheck(FailedCheck {
            origin: CheckOrigin::Block(2),
            index: 1,
            check,
        });
        assert_eq!(
            denial.to_string(),
            r#"check 1 of block 2 failed: check if operation("read")"#
        );
        assert_eq!(Denial::NoMatchingPolicy.to_string(), "no policy matched");
    }

    fn scoped(scope: FactScope) -> Vec<FactSet> {
        let root = KeyPair::from_seed(&[1; 32]);
        let token = Token::issue(
            &root,
            BlockBuilder::new().code(r#"user("admin")"#).unwrap(),
            KeyPair::from_seed(&[2; 32]),
        )
        .unwrap()
        .append(
            BlockBuilder::new().code(r#"extra(1)"#).unwrap(),
            KeyPair::from_seed(&[3; 32]),
        )
        .unwrap()
        .append(
            BlockBuilder::new().code(r#"extra(2)"#).unwrap(),
            KeyPair::from_seed(&[4; 32]),
        )
        .unwrap();

        let authorizer = token
            .authorizer(&root.public())
            .unwrap()
            .with_config(AuthorizerConfig {
                scope,
                ..AuthorizerConfig::default()
            });
        authorizer.closures().unwrap()
    }

    #[test]
    fn authority_scope_builds_one_closure_per_block() {
        let closures = scoped(FactScope::default());
        let extra = |n: i64| Fact::new("extra", [n]);

        assert_eq!(closures.len(), 3);
        assert!(!closures[0].contains(&extra(1)));
        assert!(closures[1].contains(&extra(1)));
        assert!(closures[1].contains(&Fact::new("user", ["admin"])));
        assert!(!closures[2].contains(&extra(1)));
        assert!(closures[2].contains(&extra(2)));
    }

    #[test]
    fn preceding_scope_accumulates_attenuations_in_order() {
        let closures = scoped(FactScope::Preceding);
        let extra = |n: i64| Fact::new("extra", [n]);

        assert!(!closures[0].contains(&extra(1)));
        assert!(!closures[1].contains(&extra(2)));
        assert!(closures[2].contains(&extra(1)));
        assert!(closures[2].contains(&extra(2)));
    }
}
