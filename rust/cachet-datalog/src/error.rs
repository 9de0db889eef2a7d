//! Error types for the Datalog engine

use thiserror::Error;

use crate::ValueType;

/// Errors produced while turning source text (or decoded statements) into
/// well-formed facts, rules, checks and policies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// The input could not be parsed.
    #[error("Unexpected input at offset {offset} in {input:?}")]
    Parse {
        /// The full text being parsed.
        input: String,
        /// Byte offset at which parsing stopped.
        offset: usize,
    },

    /// A fact contains a variable.
    #[error("Fact {fact} contains variable ${variable}")]
    VariableInFact {
        /// The offending fact, rendered as source.
        fact: String,
        /// The variable name.
        variable: String,
    },

    /// A head or expression variable is not bound by any body predicate.
    #[error("Variable ${variable} in {statement} is not bound by a predicate")]
    UnboundVariable {
        /// The offending statement, rendered as source.
        statement: String,
        /// The variable name.
        variable: String,
    },

    /// A check or policy has no queries.
    #[error("{statement} has no queries")]
    EmptyQueries {
        /// The kind of statement.
        statement: &'static str,
    },

    /// The text parsed, but as a different kind of statement.
    #[error("Expected {expected}, found {found}")]
    UnexpectedStatement {
        /// What the caller asked for.
        expected: &'static str,
        /// The statement that was found, rendered as source.
        found: String,
    },
}

impl SyntaxError {
    pub(crate) fn at(input: &str, remaining: &str) -> Self {
        SyntaxError::Parse {
            input: input.to_owned(),
            offset: input.len().saturating_sub(remaining.len()),
        }
    }
}

/// The fixpoint did not converge within its bounds.
///
/// This is a hard failure: a closure that was cut short is never used to
/// answer checks or policies.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationError {
    /// More passes than the iteration cap were needed.
    #[error("Fixpoint did not converge within {limit} iterations")]
    IterationLimit {
        /// The cap that was hit.
        limit: usize,
    },

    /// The closure grew past the fact cap.
    #[error("Closure exceeded {limit} facts")]
    FactLimit {
        /// The cap that was hit.
        limit: usize,
    },

    /// A query examined more candidate bindings than allowed.
    #[error("Query examined more than {limit} candidate bindings")]
    BindingLimit {
        /// The cap that was hit.
        limit: usize,
    },
}

/// Failure to evaluate an expression under a set of bindings.
///
/// These never escape the engine: an expression that fails to evaluate
/// simply does not hold, so the binding it was tested against is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Unbound variable ${0}")]
    UnboundVariable(String),

    #[error("Cannot apply {operation} to {left}")]
    InvalidOperand {
        operation: &'static str,
        left: ValueType,
    },

    #[error("Cannot apply {operation} to {left} and {right}")]
    InvalidOperands {
        operation: &'static str,
        left: ValueType,
        right: ValueType,
    },

    #[error("Integer overflow in {0}")]
    Overflow(&'static str),

    #[error("Division by zero")]
    DivisionByZero,
}
