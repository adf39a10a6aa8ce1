//! Command Model
//!
//! A [`Command`] is the immutable result of parsing one request line: an
//! upper-cased keyword, an optional key and an optional value. It is built
//! fresh for every line and consumed once by the execution engine.
//!
//! ## Arity Contracts
//!
//! ```text
//! SET, INCRBY                          key + value
//! GET, DEL, INCR, SELECT               key only
//! MULTI, DISCARD, EXEC, COMPACT,       nothing
//! DISCONNECT
//! ```
//!
//! Validation is purely structural. Whether a value is numeric is only
//! checked when the command actually runs.

use crate::protocol::types::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of supported command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Set,
    Get,
    Del,
    Incr,
    IncrBy,
    Multi,
    Discard,
    Exec,
    Select,
    Compact,
    Disconnect,
}

impl Keyword {
    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Set => "SET",
            Keyword::Get => "GET",
            Keyword::Del => "DEL",
            Keyword::Incr => "INCR",
            Keyword::IncrBy => "INCRBY",
            Keyword::Multi => "MULTI",
            Keyword::Discard => "DISCARD",
            Keyword::Exec => "EXEC",
            Keyword::Select => "SELECT",
            Keyword::Compact => "COMPACT",
            Keyword::Disconnect => "DISCONNECT",
        }
    }

    /// Keywords handled by the transaction machinery itself; never queued.
    pub fn is_transaction_control(&self) -> bool {
        matches!(
            self,
            Keyword::Multi | Keyword::Exec | Keyword::Discard | Keyword::Disconnect
        )
    }
}

impl FromStr for Keyword {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SET" => Ok(Keyword::Set),
            "GET" => Ok(Keyword::Get),
            "DEL" => Ok(Keyword::Del),
            "INCR" => Ok(Keyword::Incr),
            "INCRBY" => Ok(Keyword::IncrBy),
            "MULTI" => Ok(Keyword::Multi),
            "DISCARD" => Ok(Keyword::Discard),
            "EXEC" => Ok(Keyword::Exec),
            "SELECT" => Ok(Keyword::Select),
            "COMPACT" => Ok(Keyword::Compact),
            "DISCONNECT" => Ok(Keyword::Disconnect),
            _ => Err(CommandError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural errors found while validating a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0} command expected 2 arguments but none was given (i.e no Key & value)")]
    MissingKeyAndValue(Keyword),

    #[error("{0} command expected 2 arguments but 1 was given (i.e no value)")]
    MissingValue(Keyword),

    #[error("{0} command expected 1 argument but none was given (i.e no Key)")]
    MissingKey(Keyword),

    #[error("{0} command expected 1 argument but 2 was given")]
    UnexpectedValue(Keyword),

    #[error("{0} command expected no argument but was given")]
    UnexpectedArguments(Keyword),

    #[error("unknown command {0}")]
    Unknown(String),
}

/// A parsed request: keyword plus up to two positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    keyword: String,
    key: Option<String>,
    value: Option<Value>,
}

impl Command {
    /// Creates a command from a keyword and its positional arguments.
    ///
    /// The keyword is upper-cased. The first argument becomes the key (as
    /// text) and the second the value, keeping its scalar type. Further
    /// arguments are ignored; the parser rejects them before getting here.
    ///
    /// # Example
    /// ```
    /// use kvdb::protocol::command::Command;
    /// use kvdb::protocol::types::Value;
    ///
    /// let cmd = Command::new("set", vec![Value::from("name"), Value::from(7i64)]);
    /// assert_eq!(cmd.keyword(), "SET");
    /// assert_eq!(cmd.key(), Some("name"));
    /// assert_eq!(cmd.value(), Some(&Value::Int(7)));
    /// ```
    pub fn new(keyword: impl AsRef<str>, args: Vec<Value>) -> Self {
        let mut args = args.into_iter();
        let key = args.next().map(|arg| arg.to_string());
        let value = args.next();

        Self {
            keyword: keyword.as_ref().to_uppercase(),
            key,
            value,
        }
    }

    /// The upper-cased keyword as it was received.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Checks the command against its keyword's arity contract.
    ///
    /// Returns the recognized keyword on success.
    pub fn validate(&self) -> Result<Keyword, CommandError> {
        self.request().map(|request| request.keyword())
    }

    /// Validates the command and unpacks its arguments by keyword.
    pub fn request(&self) -> Result<Request<'_>, CommandError> {
        let keyword: Keyword = self.keyword.parse()?;

        let request = match keyword {
            Keyword::Set => {
                let (key, value) = self.key_and_value(keyword)?;
                Request::Set { key, value }
            }
            Keyword::IncrBy => {
                let (key, delta) = self.key_and_value(keyword)?;
                Request::IncrBy { key, delta }
            }
            Keyword::Get => Request::Get {
                key: self.key_only(keyword)?,
            },
            Keyword::Del => Request::Del {
                key: self.key_only(keyword)?,
            },
            Keyword::Incr => Request::Incr {
                key: self.key_only(keyword)?,
            },
            Keyword::Select => Request::Select {
                index: self.key_only(keyword)?,
            },
            Keyword::Multi => self.no_arguments(keyword, Request::Multi)?,
            Keyword::Discard => self.no_arguments(keyword, Request::Discard)?,
            Keyword::Exec => self.no_arguments(keyword, Request::Exec)?,
            Keyword::Compact => self.no_arguments(keyword, Request::Compact)?,
            Keyword::Disconnect => self.no_arguments(keyword, Request::Disconnect)?,
        };

        Ok(request)
    }

    fn key_and_value(&self, keyword: Keyword) -> Result<(&str, &Value), CommandError> {
        let key = self
            .key
            .as_deref()
            .ok_or(CommandError::MissingKeyAndValue(keyword))?;
        let value = self
            .value
            .as_ref()
            .ok_or(CommandError::MissingValue(keyword))?;
        Ok((key, value))
    }

    fn key_only(&self, keyword: Keyword) -> Result<&str, CommandError> {
        let key = self
            .key
            .as_deref()
            .ok_or(CommandError::MissingKey(keyword))?;
        if self.value.is_some() {
            return Err(CommandError::UnexpectedValue(keyword));
        }
        Ok(key)
    }

    fn no_arguments<'a>(
        &self,
        keyword: Keyword,
        request: Request<'a>,
    ) -> Result<Request<'a>, CommandError> {
        if self.key.is_some() || self.value.is_some() {
            return Err(CommandError::UnexpectedArguments(keyword));
        }
        Ok(request)
    }
}

/// A structurally valid command, borrowing its arguments from the [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Set { key: &'a str, value: &'a Value },
    Get { key: &'a str },
    Del { key: &'a str },
    Incr { key: &'a str },
    IncrBy { key: &'a str, delta: &'a Value },
    Select { index: &'a str },
    Multi,
    Discard,
    Exec,
    Compact,
    Disconnect,
}

impl Request<'_> {
    pub fn keyword(&self) -> Keyword {
        match self {
            Request::Set { .. } => Keyword::Set,
            Request::Get { .. } => Keyword::Get,
            Request::Del { .. } => Keyword::Del,
            Request::Incr { .. } => Keyword::Incr,
            Request::IncrBy { .. } => Keyword::IncrBy,
            Request::Select { .. } => Keyword::Select,
            Request::Multi => Keyword::Multi,
            Request::Discard => Keyword::Discard,
            Request::Exec => Keyword::Exec,
            Request::Compact => Keyword::Compact,
            Request::Disconnect => Keyword::Disconnect,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Keyword: {:?}, Key: {:?}, Value: {:?}}}",
            self.keyword, self.key, self.value
        )
    }
}
