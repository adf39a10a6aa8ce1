//! Stored Value Types
//!
//! Every value held by the storage engine is one of two scalars:
//!
//! - `Str`: the text a client sent (all parsed arguments start out as strings)
//! - `Int`: a 64-bit signed integer, produced by `INCR`/`INCRBY`
//!
//! Keeping the tag explicit makes the integer conversion rules of the
//! increment commands and the quoting rules of the reply renderer exhaustive.
//!
//! ## Rendering
//!
//! `Display` writes the raw scalar without any quoting. Quoting strings is a
//! reply-level concern handled by [`crate::protocol::reply`].

use std::fmt;

/// A scalar stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A text value. Strings holding a base-10 integer can still be incremented.
    Str(String),

    /// A native integer value.
    Int(i64),
}

impl Value {
    /// Creates a new string value.
    ///
    /// # Example
    /// ```
    /// use kvdb::protocol::types::Value;
    /// let value = Value::string("hello");
    /// assert!(value.is_string());
    /// ```
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Creates a new integer value.
    pub fn integer(n: i64) -> Self {
        Value::Int(n)
    }

    /// Returns true if this value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Converts the value to an integer.
    ///
    /// Native integers convert as-is. Strings convert when they contain a
    /// base-10 integer and nothing else. Anything else yields `None`.
    ///
    /// # Example
    /// ```
    /// use kvdb::protocol::types::Value;
    /// assert_eq!(Value::string("42").to_integer(), Some(42));
    /// assert_eq!(Value::string("4 2").to_integer(), None);
    /// assert_eq!(Value::integer(-7).to_integer(), Some(-7));
    /// ```
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.parse().ok(),
        }
    }

    /// Attempts to extract the inner string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Type tag attached to a result, rendered as `(<kind>) ` before the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Integer => f.write_str("integer"),
        }
    }
}
