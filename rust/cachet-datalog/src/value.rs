//! Ground values that appear in facts and expressions.
//!
//! Every argument of a [`Fact`](crate::Fact) is a [`Value`]. Values are
//! totally ordered so that they can live in sets and so that fact sets
//! enumerate deterministically.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// The latest representable date, `9999-12-31T23:59:59Z`. Later instants
/// have no four-digit-year RFC 3339 form and so could not be written back as
/// source.
pub const MAX_DATE: u64 = 253_402_300_799;

/// A typed, ground datum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Signed 64-bit integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// Arbitrary byte sequence, written `hex:0a1b` in source.
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// `true` or `false`.
    Bool(bool),
    /// Seconds since the UNIX epoch, written as an RFC 3339 timestamp.
    /// Decoding rejects anything past [`MAX_DATE`].
    Date(#[serde(deserialize_with = "bounded_date")] u64),
    /// A set of scalar values.
    Set(BTreeSet<Value>),
}

/// The type tag of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`Value::Integer`]
    Integer,
    /// [`Value::String`]
    String,
    /// [`Value::Bytes`]
    Bytes,
    /// [`Value::Bool`]
    Bool,
    /// [`Value::Date`]
    Date,
    /// [`Value::Set`]
    Set,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::String => "string",
            ValueType::Bytes => "bytes",
            ValueType::Bool => "bool",
            ValueType::Date => "date",
            ValueType::Set => "set",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Bool(_) => ValueType::Bool,
            Value::Date(_) => ValueType::Date,
            Value::Set(_) => ValueType::Set,
        }
    }

    /// Builds a set value from anything convertible into values.
    pub fn set<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Set(values.into_iter().map(Into::into).collect())
    }

    /// Builds a date value from a UTC timestamp. Instants before the epoch
    /// or after [`MAX_DATE`] are not representable and yield `None`.
    #[must_use]
    pub fn date(instant: DateTime<Utc>) -> Option<Self> {
        u64::try_from(instant.timestamp())
            .ok()
            .filter(|seconds| *seconds <= MAX_DATE)
            .map(Value::Date)
    }
}

fn bounded_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let seconds = u64::deserialize(deserializer)?;
    if seconds > MAX_DATE {
        return Err(D::Error::custom(format!("date {seconds} is later than {MAX_DATE}")));
    }
    Ok(seconds)
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(value: BTreeSet<Value>) -> Self {
        Value::Set(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::String(value) => write_quoted(f, value),
            Value::Bytes(bytes) => {
                f.write_str("hex:")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Bool(value) => write!(f, "{value}"),
            Value::Date(seconds) => {
                match i64::try_from(*seconds)
                    .ok()
                    .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
                {
                    Some(instant) => {
                        f.write_str(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
                    }
                    None => write!(f, "{seconds}"),
                }
            }
            Value::Set(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for character in value.chars() {
        match character {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}
