//! Expression constraints evaluated against the bindings of a query.
//!
//! Expressions appear in rule, check and policy bodies next to predicates,
//! e.g. `$time < 2030-01-01T00:00:00Z` or `$path.starts_with("/pub")`. An
//! expression holds for a set of bindings when it evaluates to `true`; any
//! evaluation failure (unbound variable, type mismatch, overflow) means it
//! does not hold.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bindings, ExpressionError, Term, Value, ValueType};

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `!expr`
    Negate,
    /// `expr.length()`
    Length,
}

/// Infix and method operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    Add,
    Sub,
    Mul,
    Div,
    Contains,
    StartsWith,
    EndsWith,
    Intersection,
    Union,
}

const METHOD_PRECEDENCE: u8 = 7;
const NEGATE_PRECEDENCE: u8 = 6;
const TERM_PRECEDENCE: u8 = 8;

impl BinaryOp {
    /// Source token for infix operators, method name for method operators.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "starts_with",
            BinaryOp::EndsWith => "ends_with",
            BinaryOp::Intersection => "intersection",
            BinaryOp::Union => "union",
        }
    }

    /// Whether this operator is written `left.method(right)`.
    pub fn is_method(&self) -> bool {
        matches!(
            self,
            BinaryOp::Contains
                | BinaryOp::StartsWith
                | BinaryOp::EndsWith
                | BinaryOp::Intersection
                | BinaryOp::Union
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::LessThan
            | BinaryOp::GreaterThan
            | BinaryOp::LessOrEqual
            | BinaryOp::GreaterOrEqual => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
            _ => METHOD_PRECEDENCE,
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Expression {
    Term(Term),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn var<N: Into<String>>(name: N) -> Self {
        Expression::Term(Term::var(name))
    }

    pub fn value<V: Into<Value>>(value: V) -> Self {
        Expression::Term(Term::value(value))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    /// Names of every variable referenced by this expression.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expression::Term(term) => {
                if let Some(name) = term.name() {
                    names.insert(name);
                }
            }
            Expression::Unary(_, operand) => operand.collect_variables(names),
            Expression::Binary(_, left, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }

    /// Evaluates the expression to a value.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, ExpressionError> {
        match self {
            Expression::Term(Term::Value(value)) => Ok(value.clone()),
            Expression::Term(Term::Variable(name)) => bindings
                .read(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnboundVariable(name.clone())),
            Expression::Unary(op, operand) => unary(*op, operand.evaluate(bindings)?),
            Expression::Binary(BinaryOp::Or, left, right) => {
                if expect_bool("||", left.evaluate(bindings)?)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(expect_bool("||", right.evaluate(bindings)?)?))
                }
            }
            Expression::Binary(BinaryOp::And, left, right) => {
                if expect_bool("&&", left.evaluate(bindings)?)? {
                    Ok(Value::Bool(expect_bool("&&", right.evaluate(bindings)?)?))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            Expression::Binary(op, left, right) => {
                binary(*op, left.evaluate(bindings)?, right.evaluate(bindings)?)
            }
        }
    }

    /// Whether the expression evaluates to `true` under `bindings`.
    pub fn holds(&self, bindings: &Bindings) -> bool {
        matches!(self.evaluate(bindings), Ok(Value::Bool(true)))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Term(_) => TERM_PRECEDENCE,
            Expression::Unary(UnaryOp::Negate, _) => NEGATE_PRECEDENCE,
            Expression::Unary(UnaryOp::Length, _) => METHOD_PRECEDENCE,
            Expression::Binary(op, _, _) => op.precedence(),
        }
    }
}

fn expect_bool(operation: &'static str, value: Value) -> Result<bool, ExpressionError> {
    match value {
        Value::Bool(value) => Ok(value),
        other => Err(ExpressionError::InvalidOperand {
            operation,
            left: other.value_type(),
        }),
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, ExpressionError> {
    match (op, operand) {
        (UnaryOp::Negate, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOp::Length, Value::String(value)) => length(value.len()),
        (UnaryOp::Length, Value::Bytes(value)) => length(value.len()),
        (UnaryOp::Length, Value::Set(value)) => length(value.len()),
        (op, other) => Err(ExpressionError::InvalidOperand {
            operation: match op {
                UnaryOp::Negate => "!",
                UnaryOp::Length => "length",
            },
            left: other.value_type(),
        }),
    }
}

fn length(len: usize) -> Result<Value, ExpressionError> {
    i64::try_from(len)
        .map(Value::Integer)
        .map_err(|_| ExpressionError::Overflow("length"))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExpressionError> {
    use BinaryOp::*;

    let value = match (op, &left, &right) {
        (Equal, _, _) => Value::Bool(left == right),
        (NotEqual, _, _) => Value::Bool(left != right),

        (LessThan, Value::Integer(l), Value::Integer(r)) => Value::Bool(l < r),
        (GreaterThan, Value::Integer(l), Value::Integer(r)) => Value::Bool(l > r),
        (LessOrEqual, Value::Integer(l), Value::Integer(r)) => Value::Bool(l <= r),
        (GreaterOrEqual, Value::Integer(l), Value::Integer(r)) => Value::Bool(l >= r),
        (LessThan, Value::Date(l), Value::Date(r)) => Value::Bool(l < r),
        (GreaterThan, Value::Date(l), Value::Date(r)) => Value::Bool(l > r),
        (LessOrEqual, Value::Date(l), Value::Date(r)) => Value::Bool(l <= r),
        (GreaterOrEqual, Value::Date(l), Value::Date(r)) => Value::Bool(l >= r),

        (Add, Value::Integer(l), Value::Integer(r)) => {
            Value::Integer(l.checked_add(*r).ok_or(ExpressionError::Overflow("+"))?)
        }
        (Add, Value::String(l), Value::String(r)) => Value::String(format!("{l}{r}")),
        (Sub, Value::Integer(l), Value::Integer(r)) => {
            Value::Integer(l.checked_sub(*r).ok_or(ExpressionError::Overflow("-"))?)
        }
        (Mul, Value::Integer(l), Value::Integer(r)) => {
            Value::Integer(l.checked_mul(*r).ok_or(ExpressionError::Overflow("*"))?)
        }
        (Div, Value::Integer(_), Value::Integer(0)) => {
            return Err(ExpressionError::DivisionByZero);
        }
        (Div, Value::Integer(l), Value::Integer(r)) => {
            Value::Integer(l.checked_div(*r).ok_or(ExpressionError::Overflow("/"))?)
        }

        (Contains, Value::Set(l), Value::Set(r)) => Value::Bool(r.is_subset(l)),
        (Contains, Value::Set(l), element) => Value::Bool(l.contains(element)),
        (Contains, Value::String(l), Value::String(r)) => Value::Bool(l.contains(r.as_str())),
        (StartsWith, Value::String(l), Value::String(r)) => {
            Value::Bool(l.starts_with(r.as_str()))
        }
        (EndsWith, Value::String(l), Value::String(r)) => Value::Bool(l.ends_with(r.as_str())),
        (Intersection, Value::Set(l), Value::Set(r)) => {
            Value::Set(l.intersection(r).cloned().collect())
        }
        (Union, Value::Set(l), Value::Set(r)) => Value::Set(l.union(r).cloned().collect()),

        _ => {
            return Err(mismatch(op, left.value_type(), right.value_type()));
        }
    };
    Ok(value)
}

fn mismatch(op: BinaryOp, left: ValueType, right: ValueType) -> ExpressionError {
    ExpressionError::InvalidOperands {
        operation: op.symbol(),
        left,
        right,
    }
}

struct Grouped<'a>(&'a Expression, bool);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Term(term) => write!(f, "{term}"),
            Expression::Unary(UnaryOp::Negate, operand) => {
                let grouped = operand.precedence() < NEGATE_PRECEDENCE;
                write!(f, "!{}", Grouped(operand, grouped))
            }
            Expression::Unary(UnaryOp::Length, operand) => {
                let grouped = operand.precedence() < METHOD_PRECEDENCE;
                write!(f, "{}.length()", Grouped(operand, grouped))
            }
            Expression::Binary(op, left, right) if op.is_method() => {
                let grouped = left.precedence() < METHOD_PRECEDENCE;
                write!(f, "{}.{}({right})", Grouped(left, grouped), op.symbol())
            }
            Expression::Binary(op, left, right) => {
                let precedence = op.precedence();
                write!(
                    f,
                    "{} {} {}",
                    Grouped(left, left.precedence() < precedence),
                    op.symbol(),
                    Grouped(right, right.precedence() <= precedence)
                )
            }
        }
    }
}
