//! Execution Results
//!
//! The execution engine never fails a request: every outcome, including
//! errors, is folded into a [`CommandResult`]. Commands that produce several
//! results (`EXEC`, `COMPACT`) return a [`Reply::Sequence`].

use crate::protocol::command::CommandError;
use crate::protocol::parser::ParseError;
use crate::protocol::types::{Value, ValueKind};
use crate::storage::StorageError;
use thiserror::Error;

/// Reply token for a successful state change.
pub const OK: &str = "OK";

/// Reply token for a command accepted into a transaction.
pub const QUEUED: &str = "QUEUED";

/// Reply token for a missing key.
pub const NIL: &str = "(nil)";

/// Every error a single request can end with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Malformed request line
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// Structurally invalid command
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Transaction control used in the wrong state
    #[error("{0}")]
    MultiBlock(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecError {
    pub(crate) fn without_multi(keyword: impl std::fmt::Display) -> Self {
        ExecError::MultiBlock(format!("{} without MULTI", keyword))
    }

    pub(crate) fn nested_multi() -> Self {
        ExecError::MultiBlock("MULTI calls can not be nested".to_string())
    }

    /// Returns true for a missing-key failure.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ExecError::Storage(StorageError::KeyNotFound(_)))
    }
}

/// The structured outcome of one command.
///
/// `reply` is a literal token printed instead of the value (`OK`, `QUEUED`,
/// `(nil)`, a reconstructed `SET` line). It may accompany an error, in which
/// case the token is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub value: Option<Value>,
    pub kind: Option<ValueKind>,
    pub reply: Option<String>,
    pub error: Option<ExecError>,
}

impl CommandResult {
    /// A bare reply token.
    pub fn token(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn ok() -> Self {
        Self::token(OK)
    }

    pub fn queued() -> Self {
        Self::token(QUEUED)
    }

    /// A value returned verbatim.
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// An integer tagged with [`ValueKind::Integer`].
    pub fn integer(n: i64) -> Self {
        Self {
            value: Some(Value::Int(n)),
            kind: Some(ValueKind::Integer),
            ..Self::default()
        }
    }

    /// A failure with no reply token; renders as `(error) ERR <message>`.
    pub fn error(error: impl Into<ExecError>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attaches a reply token that takes precedence over the error message.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// What one request produces: a single result or an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Single(CommandResult),
    Sequence(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Single(CommandResult::ok())
    }

    pub fn error(error: impl Into<ExecError>) -> Self {
        Reply::Single(CommandResult::error(error))
    }

    /// Returns the single result, if this is not a sequence.
    pub fn as_single(&self) -> Option<&CommandResult> {
        match self {
            Reply::Single(result) => Some(result),
            Reply::Sequence(_) => None,
        }
    }

    /// Returns the elements, if this is a sequence.
    pub fn as_sequence(&self) -> Option<&[Reply]> {
        match self {
            Reply::Sequence(items) => Some(items),
            Reply::Single(_) => None,
        }
    }
}

impl From<CommandResult> for Reply {
    fn from(result: CommandResult) -> Self {
        Reply::Single(result)
    }
}
