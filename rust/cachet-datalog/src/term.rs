//! Terms: the arguments of predicate patterns.
//!
//! A [`Term`] is either a named variable (`$name` in source) or a ground
//! [`Value`]. Unlike a [`Fact`](crate::Fact), a [`Predicate`](crate::Predicate)
//! may mix both; matching a predicate against a fact binds its variables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Term represents either a constant value or a variable placeholder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// A named variable, bound by matching.
    Variable(String),
    /// A concrete value.
    Value(Value),
}

impl Term {
    /// Create a variable term with the given name (without the `$` sigil).
    pub fn var<N: Into<String>>(name: N) -> Self {
        Term::Variable(name.into())
    }

    /// Create a constant term.
    pub fn value<V: Into<Value>>(value: V) -> Self {
        Term::Value(value.into())
    }

    /// Check if this term is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Get the variable name if this is a variable term.
    pub fn name(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            Term::Value(_) => None,
        }
    }

    /// Get the constant if this is a value term.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Term::Variable(_) => None,
            Term::Value(value) => Some(value),
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Value(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "${name}"),
            Term::Value(value) => write!(f, "{value}"),
        }
    }
}
