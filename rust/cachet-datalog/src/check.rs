//! Checks and policies: disjunctions of queries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{EvaluationError, FactSet, Query, RunLimits, SyntaxError, parser};

/// Whether any of `queries` is satisfied, stopping at the first that is.
fn any_satisfied(
    queries: &[Query],
    facts: &FactSet,
    limits: &RunLimits,
) -> Result<bool, EvaluationError> {
    for query in queries {
        if query.is_satisfied(facts, limits)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn write_queries(f: &mut fmt::Formatter<'_>, queries: &[Query]) -> fmt::Result {
    for (index, query) in queries.iter().enumerate() {
        if index > 0 {
            f.write_str(" or ")?;
        }
        write!(f, "{query}")?;
    }
    Ok(())
}

/// `check if q1 or q2 ...`
///
/// A check passes when at least one of its queries is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Check {
    queries: Vec<Query>,
}

impl Check {
    /// Create a check from its alternative queries.
    ///
    /// # Errors
    ///
    /// Fails when `queries` is empty or one of them uses an unbound variable.
    pub fn new(queries: Vec<Query>) -> Result<Self, SyntaxError> {
        let check = Self::unchecked(queries);
        check.validate()?;
        Ok(check)
    }

    pub(crate) fn unchecked(queries: Vec<Query>) -> Self {
        Self { queries }
    }

    /// The alternatives, in declaration order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Re-validate a check that was decoded rather than parsed.
    ///
    /// # Errors
    ///
    /// Fails when there are no queries or one of them uses an unbound
    /// variable.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        if self.queries.is_empty() {
            return Err(SyntaxError::EmptyQueries { statement: "check" });
        }
        self.queries.iter().try_for_each(Query::validate)
    }

    /// Whether at least one alternative holds against `facts`.
    ///
    /// # Errors
    ///
    /// Fails when a query exceeds `limits`.
    pub fn is_satisfied(
        &self,
        facts: &FactSet,
        limits: &RunLimits,
    ) -> Result<bool, EvaluationError> {
        any_satisfied(&self.queries, facts, limits)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("check if ")?;
        write_queries(f, &self.queries)
    }
}

impl FromStr for Check {
    type Err = SyntaxError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parser::parse_check(source)
    }
}

/// The effect of a matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Allow,
    Deny,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Allow => f.write_str("allow"),
            PolicyKind::Deny => f.write_str("deny"),
        }
    }
}

/// `allow if ...` or `deny if ...`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Policy {
    kind: PolicyKind,
    queries: Vec<Query>,
}

impl Policy {
    /// Create a policy from its effect and alternative queries.
    ///
    /// # Errors
    ///
    /// Fails when `queries` is empty or one of them uses an unbound variable.
    pub fn new(kind: PolicyKind, queries: Vec<Query>) -> Result<Self, SyntaxError> {
        let policy = Self::unchecked(kind, queries);
        policy.validate()?;
        Ok(policy)
    }

    pub(crate) fn unchecked(kind: PolicyKind, queries: Vec<Query>) -> Self {
        Self { kind, queries }
    }

    /// `allow if true`
    pub fn allow_all() -> Self {
        Self {
            kind: PolicyKind::Allow,
            queries: vec![Query::constant(true)],
        }
    }

    /// What happens when the policy matches.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// The alternatives, in declaration order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Re-validate a decoded policy.
    ///
    /// # Errors
    ///
    /// Fails when there are no queries or one of them uses an unbound
    /// variable.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        if self.queries.is_empty() {
            return Err(SyntaxError::EmptyQueries {
                statement: "policy",
            });
        }
        self.queries.iter().try_for_each(Query::validate)
    }

    /// Whether at least one alternative holds against `facts`.
    ///
    /// # Errors
    ///
    /// Fails when a query exceeds `limits`.
    pub fn matches(&self, facts: &FactSet, limits: &RunLimits) -> Result<bool, EvaluationError> {
        any_satisfied(&self.queries, facts, limits)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} if ", self.kind)?;
        write_queries(f, &self.queries)
    }
}

impl FromStr for Policy {
    type Err = SyntaxError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parser::parse_policy(source)
    }
}
