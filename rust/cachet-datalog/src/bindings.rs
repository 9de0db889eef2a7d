//! Variable bindings built up while a query body is matched against facts.

use std::collections::BTreeMap;

use crate::{Fact, Predicate, Term, Value};

/// Variable assignments accumulated while matching a query body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    variables: BTreeMap<String, Value>,
}

impl Bindings {
    /// An empty frame with no variable bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `variable` is bound.
    #[must_use]
    pub fn has(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    /// The value bound to `variable`, if any.
    #[must_use]
    pub fn read(&self, variable: &str) -> Option<&Value> {
        self.variables.get(variable)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Bound variables and their values, ordered by variable name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Assign `value` to `variable`, or confirm an existing assignment.
    ///
    /// Returns `None` when the variable is already bound to a different value.
    #[must_use]
    pub fn assign(mut self, variable: &str, value: &Value) -> Option<Self> {
        match self.variables.get(variable) {
            Some(existing) if existing == value => Some(self),
            Some(_) => None,
            None => {
                self.variables.insert(variable.to_owned(), value.clone());
                Some(self)
            }
        }
    }

    /// Unify a predicate pattern with a fact under these bindings.
    ///
    /// Returns the extended frame, or `None` when the name, arity, a
    /// constant or an already bound variable disagrees with the fact.
    #[must_use]
    pub fn unify(&self, predicate: &Predicate, fact: &Fact) -> Option<Self> {
        if predicate.name() != fact.name() || predicate.arity() != fact.arity() {
            return None;
        }

        let mut frame = self.clone();
        for (term, value) in predicate.terms().iter().zip(fact.values()) {
            frame = match term {
                Term::Value(constant) if constant == value => frame,
                Term::Value(_) => return None,
                Term::Variable(name) => frame.assign(name, value)?,
            };
        }
        Some(frame)
    }

    /// Substitute bound variables into a predicate, producing a fact.
    ///
    /// Returns `None` if any variable of the predicate is unbound.
    #[must_use]
    pub fn substitute(&self, predicate: &Predicate) -> Option<Fact> {
        let values = predicate
            .terms()
            .iter()
            .map(|term| match term {
                Term::Value(value) => Some(value.clone()),
                Term::Variable(name) => self.read(name).cloned(),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Fact::new(predicate.name(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_binds_repeated_variables_consistently() {
        let pattern = Predicate::new("edge", [Term::var("x"), Term::var("x")]);

        let loop_fact = Fact::new("edge", ["a", "a"]);
        let edge_fact = Fact::new("edge", ["a", "b"]);

        assert!(Bindings::new().unify(&pattern, &loop_fact).is_some());
        assert!(Bindings::new().unify(&pattern, &edge_fact).is_none());
    }

    #[test]
    fn it_rejects_mismatched_arity_and_constants() {
        let pattern = Predicate::new("user", [Term::value("admin")]);

        assert!(Bindings::new()
            .unify(&pattern, &Fact::new("user", ["guest"]))
            .is_none());
        assert!(Bindings::new()
            .unify(&pattern, &Fact::new("user", ["admin", "extra"]))
            .is_none());
        assert!(Bindings::new()
            .unify(&pattern, &Fact::new("user", ["admin"]))
            .is_some());
    }

    #[test]
    fn it_substitutes_bound_variables() {
        let frame = Bindings::new().assign("f", &Value::from("file1")).unwrap();
        let head = Predicate::new("can_read", [Term::var("f")]);
        assert_eq!(
            frame.substitute(&head),
            Some(Fact::new("can_read", ["file1"]))
        );

        let unbound = Predicate::new("can_read", [Term::var("g")]);
        assert_eq!(frame.substitute(&unbound), None);
    }
}
