//! Fixpoint evaluation.
//!
//! [`evaluate`] computes the least fixpoint of a rule set over a fact set by
//! naive iteration: every pass applies every rule to the closure as it stood
//! at the start of the pass, then adds whatever was new. Rules only ever add
//! facts, so the result does not depend on rule order.
//!
//! Evaluation is bounded three times over. The number of passes is capped
//! (see [`RunLimits::iteration_cap`]), so is the size of the closure, and so
//! is the number of candidate bindings a single query may examine. Hitting
//! any bound is an [`EvaluationError`]; a partial closure is never returned.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{Check, EvaluationError, Fact, FactSet, Rule};

/// Smallest iteration cap derived from the input.
pub const MIN_ITERATIONS: usize = 32;

/// Default bound on the size of a closure.
pub const DEFAULT_MAX_FACTS: usize = 10_000;

/// Default bound on the candidate bindings one query may examine.
pub const DEFAULT_MAX_BINDINGS: usize = 100_000;

/// Bounds on a single fixpoint evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Largest closure allowed.
    pub max_facts: usize,
    /// Largest number of passes allowed. `None` derives the cap from the
    /// size of the input.
    pub max_iterations: Option<usize>,
    /// Largest number of candidate bindings a single query (a rule body,
    /// check or policy alternative) may examine while joining.
    pub max_bindings: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_facts: DEFAULT_MAX_FACTS,
            max_iterations: None,
            max_bindings: DEFAULT_MAX_BINDINGS,
        }
    }
}

impl RunLimits {
    /// The pass cap for an input of `facts` facts and `rules` rules.
    pub fn iteration_cap(&self, facts: usize, rules: usize) -> usize {
        match self.max_iterations {
            Some(limit) => limit,
            None => facts
                .max(1)
                .saturating_mul(rules.max(1))
                .max(MIN_ITERATIONS),
        }
    }
}

/// Computes the closure of `facts` under `rules`.
#[tracing::instrument(level = "debug", skip_all, fields(facts = facts.len(), rules = rules.len()))]
pub fn evaluate(
    mut facts: FactSet,
    rules: &[Rule],
    limits: &RunLimits,
) -> Result<FactSet, EvaluationError> {
    if facts.len() > limits.max_facts {
        return Err(EvaluationError::FactLimit {
            limit: limits.max_facts,
        });
    }

    let cap = limits.iteration_cap(facts.len(), rules.len());
    let mut passes = 0;

    loop {
        if passes >= cap {
            tracing::debug!(cap, "Evaluation did not converge");
            return Err(EvaluationError::IterationLimit { limit: cap });
        }
        passes += 1;

        let mut added: IndexSet<Fact> = IndexSet::new();
        for rule in rules {
            for fact in rule.apply(&facts, limits)? {
                if facts.contains(&fact) || !added.insert(fact) {
                    continue;
                }
                if facts.len() + added.len() > limits.max_facts {
                    tracing::debug!(limit = limits.max_facts, "Closure grew too large");
                    return Err(EvaluationError::FactLimit {
                        limit: limits.max_facts,
                    });
                }
            }
        }

        tracing::trace!(
            pass = passes,
            added = added.len(),
            total = facts.len(),
            "Completed pass"
        );

        if added.is_empty() {
            tracing::debug!(passes, closure = facts.len(), "Reached fixpoint");
            return Ok(facts);
        }
        facts.extend(added);
    }
}

/// Whether `check` is satisfied by a computed closure.
///
/// # Errors
///
/// Fails when one of the check's queries exceeds `limits`.
pub fn check_satisfied(
    check: &Check,
    closure: &FactSet,
    limits: &RunLimits,
) -> Result<bool, EvaluationError> {
    check.is_satisfied(closure, limits)
}
