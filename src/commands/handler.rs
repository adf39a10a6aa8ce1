//! Command Handler Module
//!
//! This module implements the execution engine. A [`CommandHandler`] is
//! created per connection: it shares the [`StorageEngine`] with every other
//! connection but owns its [`Session`] outright.
//!
//! ## Supported Commands
//!
//! ### Key Commands
//! - `SET key value` - Store a value
//! - `GET key` - Fetch a value (`(nil)` when absent)
//! - `DEL key` - Delete a key (`(integer) 1` / `(integer) 0`)
//! - `INCR key` - Increment an integer value by one
//! - `INCRBY key delta` - Increment an integer value by `delta`
//!
//! ### Transaction Commands
//! - `MULTI` - Start queuing commands
//! - `EXEC` - Run every queued command, in order
//! - `DISCARD` - Drop the queue
//!
//! ### Server Commands
//! - `SELECT index` - Switch the session's database
//! - `COMPACT` - Emit `SET` statements rebuilding the current database
//! - `DISCONNECT` - Close the connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ validate()  │───>│ queue or    │───>│ dispatch()  │     │
//! │  │             │    │ run now?    │    │             │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                            │                  │             │
//! │                            ▼                  ▼             │
//! │                     Session queue      StorageEngine        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//!
//! ```text
//!            MULTI                      EXEC / DISCARD
//!   Idle ─────────────> Queuing ───────────────────────> Idle
//!                        │   ▲
//!                        └───┘ any other command: QUEUED
//! ```
//!
//! Commands are validated before being queued, so a malformed command inside
//! a MULTI block is rejected right away and never reaches the queue.

use crate::commands::result::{CommandResult, ExecError, Reply, NIL};
use crate::commands::session::Session;
use crate::protocol::command::{Command, Request};
use crate::protocol::parser::parse_line;
use crate::protocol::types::{Value, ValueKind};
use crate::storage::{StorageEngine, StorageError};
use std::sync::Arc;
use tracing::{debug, trace};

/// Executes commands for a single session.
pub struct CommandHandler {
    /// The storage engine (shared across connections)
    storage: Arc<StorageEngine>,
    /// Session state (owned by this connection only)
    session: Session,
}

impl CommandHandler {
    /// Creates a handler with a fresh session on database 0.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Parses a raw request line and executes it.
    ///
    /// Syntax errors are reported like any other per-request error.
    pub fn execute_line(&mut self, line: &str) -> Reply {
        match parse_line(line) {
            Ok(command) => self.execute(command),
            Err(e) => {
                debug!(error = %e, "Rejected request line");
                Reply::error(e)
            }
        }
    }

    /// Executes a command and returns the reply.
    ///
    /// While a transaction is open, everything except transaction control is
    /// validated and queued instead of run.
    pub fn execute(&mut self, command: Command) -> Reply {
        let keyword = match command.validate() {
            Ok(keyword) => keyword,
            Err(e) => return Reply::error(e),
        };

        if self.session.in_transaction() && !keyword.is_transaction_control() {
            trace!(%keyword, queued = self.session.queued_len() + 1, "Queued command");
            self.session.enqueue(command);
            return Reply::Single(CommandResult::queued());
        }

        self.dispatch(&command)
    }

    /// Runs a command right away.
    fn dispatch(&mut self, command: &Command) -> Reply {
        let request = match command.request() {
            Ok(request) => request,
            Err(e) => return Reply::error(e),
        };

        let db = self.session.db_index();
        debug!(db, keyword = %request.keyword(), "Executing command");

        match request {
            // Transaction commands
            Request::Multi => self.cmd_multi(),
            Request::Exec => self.cmd_exec(),
            Request::Discard => self.cmd_discard(),

            // Key commands
            Request::Set { key, value } => self.cmd_set(key, value).into(),
            Request::Get { key } => self.cmd_get(key).into(),
            Request::Del { key } => self.cmd_del(key).into(),
            Request::Incr { key } => self.cmd_incr_by(key, None).into(),
            Request::IncrBy { key, delta } => self.cmd_incr_by(key, Some(delta)).into(),

            // Server commands
            Request::Select { index } => self.cmd_select(index).into(),
            Request::Compact => self.cmd_compact(),
            Request::Disconnect => {
                self.session.close();
                Reply::ok()
            }
        }
    }

    // ========================================================================
    // Transaction Commands
    // ========================================================================

    /// MULTI
    fn cmd_multi(&mut self) -> Reply {
        if self.session.in_transaction() {
            return Reply::error(ExecError::nested_multi());
        }

        self.session.begin();
        debug!("Transaction started");
        Reply::ok()
    }

    /// EXEC
    fn cmd_exec(&mut self) -> Reply {
        let Some(queue) = self.session.take_transaction() else {
            return Reply::error(ExecError::without_multi("EXEC"));
        };

        debug!(commands = queue.len(), "Executing transaction");
        Reply::Sequence(queue.into_iter().map(|cmd| self.execute(cmd)).collect())
    }

    /// DISCARD
    fn cmd_discard(&mut self) -> Reply {
        match self.session.take_transaction() {
            Some(queue) => {
                debug!(commands = queue.len(), "Transaction discarded");
                Reply::ok()
            }
            None => Reply::error(ExecError::without_multi("DISCARD")),
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// SET key value
    fn cmd_set(&self, key: &str, value: &Value) -> CommandResult {
        self.storage.set(self.session.db_index(), key, value.clone());
        CommandResult::ok()
    }

    /// GET key
    fn cmd_get(&self, key: &str) -> CommandResult {
        match self.storage.get(self.session.db_index(), key) {
            Ok(value) => CommandResult::value(value),
            Err(e) => CommandResult::error(e).with_reply(NIL),
        }
    }

    /// DEL key
    fn cmd_del(&self, key: &str) -> CommandResult {
        match self.storage.delete(self.session.db_index(), key) {
            Ok(_) => CommandResult::token("1").with_kind(ValueKind::Integer),
            Err(e) => CommandResult::error(e)
                .with_kind(ValueKind::Integer)
                .with_reply("0"),
        }
    }

    /// INCR key / INCRBY key delta
    ///
    /// A missing key is reported before a bad stored value, which is reported
    /// before a bad delta. Failures never touch the stored value.
    fn cmd_incr_by(&self, key: &str, delta: Option<&Value>) -> CommandResult {
        let result = self.storage.update(self.session.db_index(), key, |value| {
            let current = value.to_integer().ok_or(StorageError::ValueNotInteger)?;
            let delta = match delta {
                Some(delta) => delta.to_integer().ok_or(StorageError::ValueNotInteger)?,
                None => 1,
            };
            let next = current.checked_add(delta).ok_or(StorageError::Overflow)?;

            *value = Value::Int(next);
            Ok(next)
        });

        match result {
            Ok(n) => CommandResult::integer(n),
            Err(e @ StorageError::KeyNotFound(_)) => CommandResult::error(e).with_reply(NIL),
            Err(e) => CommandResult::error(e),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// SELECT index
    fn cmd_select(&mut self, index: &str) -> CommandResult {
        match self.storage.select_index(index) {
            Ok(index) => {
                self.session.select(index);
                debug!(db = index, "Selected database");
                CommandResult::ok()
            }
            Err(e) => CommandResult::error(e),
        }
    }

    /// COMPACT
    ///
    /// Works on a snapshot of the current database, sorted by key.
    fn cmd_compact(&self) -> Reply {
        let mut entries = self.storage.snapshot(self.session.db_index());
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Reply::Sequence(
            entries
                .iter()
                .map(|(key, value)| CommandResult::token(set_statement(key, value)).into())
                .collect(),
        )
    }
}

/// Builds the `SET` line that recreates one pair.
///
/// The key is quoted when it is empty, contains whitespace or starts with a
/// quote. The value is quoted whenever it is a string.
fn set_statement(key: &str, value: &Value) -> String {
    let needs_quotes =
        key.is_empty() || key.starts_with('"') || key.contains(char::is_whitespace);
    let key = if needs_quotes {
        format!("\"{}\"", key)
    } else {
        key.to_string()
    };

    match value {
        Value::Str(s) => format!("SET {} \"{}\"", key, s),
        Value::Int(n) => format!("SET {} {}", key, n),
    }
}
