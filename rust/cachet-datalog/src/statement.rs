use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Check, Fact, Policy, Rule, SyntaxError, parser};

/// Any single statement of the textual syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Fact(Fact),
    Rule(Rule),
    Check(Check),
    Policy(Policy),
}

impl Statement {
    /// Short name of the statement kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Fact(_) => "fact",
            Statement::Rule(_) => "rule",
            Statement::Check(_) => "check",
            Statement::Policy(_) => "policy",
        }
    }

    pub fn validate(&self) -> Result<(), SyntaxError> {
        match self {
            Statement::Fact(_) => Ok(()),
            Statement::Rule(rule) => rule.validate(),
            Statement::Check(check) => check.validate(),
            Statement::Policy(policy) => policy.validate(),
        }
    }

    /// Parses a `;`-separated list of statements. `//` comments run to the
    /// end of the line.
    pub fn parse_all(source: &str) -> Result<Vec<Statement>, SyntaxError> {
        parser::parse_source(source)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Fact(fact) => write!(f, "{fact}"),
            Statement::Rule(rule) => write!(f, "{rule}"),
            Statement::Check(check) => write!(f, "{check}"),
            Statement::Policy(policy) => write!(f, "{policy}"),
        }
    }
}

impl From<Fact> for Statement {
    fn from(fact: Fact) -> Self {
        Statement::Fact(fact)
    }
}

impl From<Rule> for Statement {
    fn from(rule: Rule) -> Self {
        Statement::Rule(rule)
    }
}

impl From<Check> for Statement {
    fn from(check: Check) -> Self {
        Statement::Check(check)
    }
}

impl From<Policy> for Statement {
    fn from(policy: Policy) -> Self {
        Statement::Policy(policy)
    }
}
