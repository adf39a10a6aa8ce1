//! Per-connection session state.
//!
//! A session tracks the selected database and any open transaction. It is
//! owned by exactly one connection task and never shared, so concurrent
//! `MULTI` blocks from different clients cannot see each other's queues.

use crate::protocol::command::Command;

/// Transaction state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Commands run immediately.
    Idle,
    /// Commands are queued until `EXEC` or `DISCARD`.
    Queuing,
}

#[derive(Debug, Default)]
pub struct Session {
    db_index: usize,
    /// `Some` while a MULTI block is open; the queue can only be non-empty then.
    transaction: Option<Vec<Command>>,
    closing: bool,
}

impl Session {
    /// A fresh session on database 0 with no transaction.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db_index(&self) -> usize {
        self.db_index
    }

    pub(crate) fn select(&mut self, index: usize) {
        self.db_index = index;
    }

    pub fn state(&self) -> SessionState {
        match self.transaction {
            Some(_) => SessionState::Queuing,
            None => SessionState::Idle,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Number of commands waiting for `EXEC`.
    pub fn queued_len(&self) -> usize {
        self.transaction.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn begin(&mut self) {
        self.transaction = Some(Vec::new());
    }

    /// Appends to the open transaction. Returns false when there is none.
    pub(crate) fn enqueue(&mut self, command: Command) -> bool {
        match self.transaction.as_mut() {
            Some(queue) => {
                queue.push(command);
                true
            }
            None => false,
        }
    }

    /// Closes the transaction, handing back its queue.
    pub(crate) fn take_transaction(&mut self) -> Option<Vec<Command>> {
        self.transaction.take()
    }

    /// Marks the session for termination after the current reply.
    pub(crate) fn close(&mut self) {
        self.transaction = None;
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}
