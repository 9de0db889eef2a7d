//! Cachet Datalog
//!
//! The logic language embedded in cachet tokens: facts, rules, checks and
//! policies, a textual syntax for writing them, and a bounded fixpoint
//! evaluator that computes the closure checks and policies are answered
//! against.
//!
//! ```rust
//! use cachet_datalog::{evaluate, Check, Fact, FactSet, Rule, RunLimits};
//!
//! let facts = FactSet::from_iter([Fact::new("right", ["file1", "read"])]);
//! let rule: Rule = r#"can_read($f) <- right($f, "read")"#.parse().unwrap();
//! let limits = RunLimits::default();
//! let closure = evaluate(facts, &[rule], &limits).unwrap();
//!
//! let check: Check = r#"check if can_read("file1")"#.parse().unwrap();
//! assert!(check.is_satisfied(&closure, &limits).unwrap());
//! ```

mod bindings;
mod check;
mod engine;
mod error;
mod expression;
mod fact_set;
mod parser;
mod predicate;
mod rule;
mod statement;
mod term;
mod value;

pub use bindings::Bindings;
pub use check::{Check, Policy, PolicyKind};
pub use engine::{
    DEFAULT_MAX_BINDINGS, DEFAULT_MAX_FACTS, MIN_ITERATIONS, RunLimits, check_satisfied, evaluate,
};
pub use error::{EvaluationError, ExpressionError, SyntaxError};
pub use expression::{BinaryOp, Expression, UnaryOp};
pub use fact_set::FactSet;
pub use parser::{parse_check, parse_fact, parse_policy, parse_rule, parse_source};
pub use predicate::{Fact, Predicate};
pub use rule::{Query, Rule};
pub use statement::Statement;
pub use term::Term;
pub use value::{MAX_DATE, Value, ValueType};
