//! Queries and rules.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    Bindings, EvaluationError, Expression, Fact, FactSet, Predicate, RunLimits, SyntaxError, Value,
    parser,
};

/// A conjunction of predicate patterns and expression constraints.
///
/// A query is satisfied by every set of bindings that unifies each predicate
/// with some fact and makes every expression evaluate to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Query {
    predicates: Vec<Predicate>,
    expressions: Vec<Expression>,
}

impl Query {
    /// Create a query, checking that every expression variable is bound by
    /// one of its predicates.
    pub fn new(
        predicates: Vec<Predicate>,
        expressions: Vec<Expression>,
    ) -> Result<Self, SyntaxError> {
        let query = Self::unchecked(predicates, expressions);
        query.validate()?;
        Ok(query)
    }

    pub(crate) fn unchecked(predicates: Vec<Predicate>, expressions: Vec<Expression>) -> Self {
        Self {
            predicates,
            expressions,
        }
    }

    /// A query without predicates that holds when `value` is `true`.
    pub fn constant<V: Into<Value>>(value: V) -> Self {
        Self {
            predicates: vec![],
            expressions: vec![Expression::value(value)],
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    /// Variables bound by the body predicates.
    pub fn bound_variables(&self) -> BTreeSet<&str> {
        self.predicates
            .iter()
            .flat_map(|predicate| predicate.variables())
            .collect()
    }

    /// Checks that every expression variable is bound by a predicate.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        let bound = self.bound_variables();
        for expression in &self.expressions {
            if let Some(variable) = expression
                .variables()
                .into_iter()
                .find(|variable| !bound.contains(variable))
            {
                return Err(SyntaxError::UnboundVariable {
                    statement: self.to_string(),
                    variable: variable.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// For each expression, the number of predicates that must be joined
    /// before all of its variables are bound.
    fn ready_at(&self) -> Vec<usize> {
        let mut bound = BTreeSet::new();
        let mut ready = vec![None; self.expressions.len()];
        for step in 0..=self.predicates.len() {
            if step > 0 {
                bound.extend(self.predicates[step - 1].variables());
            }
            for (slot, expression) in ready.iter_mut().zip(&self.expressions) {
                if slot.is_none() && expression.variables().is_subset(&bound) {
                    *slot = Some(step);
                }
            }
        }
        ready
            .into_iter()
            .map(|slot| slot.unwrap_or(self.predicates.len()))
            .collect()
    }

    /// Every satisfying set of bindings against `facts`.
    ///
    /// Predicates are joined left to right and each expression is applied
    /// as soon as its variables are bound, so frames that cannot satisfy it
    /// are dropped before the next join.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::BindingLimit`] once more than
    /// `limits.max_bindings` candidate bindings have been examined.
    pub fn bindings(
        &self,
        facts: &FactSet,
        limits: &RunLimits,
    ) -> Result<Vec<Bindings>, EvaluationError> {
        let ready = self.ready_at();
        let holds = |frame: &Bindings, step: usize| {
            self.expressions
                .iter()
                .zip(&ready)
                .filter(|(_, at)| **at == step)
                .all(|(expression, _)| expression.holds(frame))
        };

        let mut frames = vec![Bindings::new()];
        frames.retain(|frame| holds(frame, 0));
        let mut examined = 0usize;

        for (index, predicate) in self.predicates.iter().enumerate() {
            if frames.is_empty() {
                break;
            }
            let mut joined = Vec::new();
            for frame in &frames {
                for fact in facts.matching(predicate.name(), predicate.arity()) {
                    examined += 1;
                    if examined > limits.max_bindings {
                        return Err(EvaluationError::BindingLimit {
                            limit: limits.max_bindings,
                        });
                    }
                    if let Some(extended) = frame
                        .unify(predicate, fact)
                        .filter(|extended| holds(extended, index + 1))
                    {
                        joined.push(extended);
                    }
                }
            }
            frames = joined;
        }
        Ok(frames)
    }

    /// Whether at least one set of bindings satisfies the query.
    ///
    /// # Errors
    ///
    /// Fails when the join exceeds `limits`, see [`Query::bindings`].
    pub fn is_satisfied(
        &self,
        facts: &FactSet,
        limits: &RunLimits,
    ) -> Result<bool, EvaluationError> {
        Ok(!self.bindings(facts, limits)?.is_empty())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates = self.predicates.iter().map(|p| p as &dyn fmt::Display);
        let expressions = self.expressions.iter().map(|e| e as &dyn fmt::Display);
        for (index, element) in predicates.chain(expressions).enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

/// A deduction rule: `head <- body`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rule {
    head: Predicate,
    body: Query,
}

impl Rule {
    /// Create a rule, checking that the head and every expression only use
    /// variables bound by the body predicates.
    pub fn new(head: Predicate, body: Query) -> Result<Self, SyntaxError> {
        let rule = Self::unchecked(head, body);
        rule.validate()?;
        Ok(rule)
    }

    pub(crate) fn unchecked(head: Predicate, body: Query) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &Predicate {
        &self.head
    }

    pub fn body(&self) -> &Query {
        &self.body
    }

    pub fn validate(&self) -> Result<(), SyntaxError> {
        let bound = self.body.bound_variables();
        if let Some(variable) = self
            .head
            .variables()
            .into_iter()
            .find(|variable| !bound.contains(variable))
        {
            return Err(SyntaxError::UnboundVariable {
                statement: self.to_string(),
                variable: variable.to_owned(),
            });
        }
        self.body.validate()
    }

    /// Facts the rule derives from `facts` in a single application.
    ///
    /// # Errors
    ///
    /// Fails when the body's join exceeds `limits`, see [`Query::bindings`].
    pub fn apply(
        &self,
        facts: &FactSet,
        limits: &RunLimits,
    ) -> Result<Vec<Fact>, EvaluationError> {
        Ok(self
            .body
            .bindings(facts, limits)?
            .iter()
            .filter_map(|bindings| bindings.substitute(&self.head))
            .collect())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.head, self.body)
    }
}

impl FromStr for Rule {
    type Err = SyntaxError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parser::parse_rule(source)
    }
}

impl FromStr for Fact {
    type Err = SyntaxError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parser::parse_fact(source)
    }
}
