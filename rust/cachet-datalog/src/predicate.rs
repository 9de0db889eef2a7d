//! Predicates (patterns with variables) and facts (ground predicates).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SyntaxError, Term, Value};

/// A predicate pattern such as `right($file, "read")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Predicate {
    name: String,
    terms: Vec<Term>,
}

impl Predicate {
    /// Create a predicate from a name and its terms.
    pub fn new<N, I>(name: N, terms: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = Term>,
    {
        Self {
            name: name.into(),
            terms: terms.into_iter().collect(),
        }
    }

    /// The predicate name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The predicate terms, in declaration order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Number of terms.
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Names of every variable that occurs in this predicate.
    pub fn variables(&self) -> BTreeSet<&str> {
        self.terms.iter().filter_map(Term::name).collect()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str(")")
    }
}

/// A ground predicate, e.g. `user("admin")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fact {
    name: String,
    values: Vec<Value>,
}

impl Fact {
    /// Create a fact from a name and its arguments.
    ///
    /// ```rust
    /// use cachet_datalog::Fact;
    ///
    /// let fact = Fact::new("right", ["file1", "read"]);
    /// assert_eq!(fact.to_string(), r#"right("file1", "read")"#);
    /// ```
    pub fn new<N, I, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The fact name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fact arguments, in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.values.len()
    }
}

impl TryFrom<Predicate> for Fact {
    type Error = SyntaxError;

    fn try_from(predicate: Predicate) -> Result<Self, Self::Error> {
        let rendered = predicate.to_string();
        let mut values = Vec::with_capacity(predicate.terms.len());
        for term in predicate.terms {
            match term {
                Term::Value(value) => values.push(value),
                Term::Variable(variable) => {
                    return Err(SyntaxError::VariableInFact {
                        fact: rendered,
                        variable,
                    });
                }
            }
        }
        Ok(Fact {
            name: predicate.name,
            values,
        })
    }
}

impl From<Fact> for Predicate {
    fn from(fact: Fact) -> Self {
        Predicate {
            name: fact.name,
            terms: fact.values.into_iter().map(Term::Value).collect(),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_refuses_to_turn_a_pattern_into_a_fact() {
        let predicate = Predicate::new("user", [Term::var("name")]);
        let error = Fact::try_from(predicate).unwrap_err();
        assert!(matches!(error, SyntaxError::VariableInFact { .. }));
    }

    #[test]
    fn it_lists_variables_once() {
        let predicate = Predicate::new(
            "edge",
            [Term::var("a"), Term::var("a"), Term::value("x")],
        );
        assert_eq!(predicate.variables().into_iter().collect::<Vec<_>>(), vec!["a"]);
    }
}
