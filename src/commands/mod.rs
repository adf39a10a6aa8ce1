//! Command Execution Module
//!
//! This module implements the command processing layer for kvdb.
//! It receives parsed commands, runs them against the storage engine within
//! the scope of a client session, and returns structured results.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │ CommandHandler  │─────>│    Session      │
//! │                 │      │                 │
//! │  - Validate     │      │  - db index     │
//! │  - Queue        │      │  - MULTI queue  │
//! │  - Execute      │      └─────────────────┘
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Key Commands
//! - `SET`, `GET`, `DEL`
//! - `INCR`, `INCRBY`
//!
//! ### Transaction Commands
//! - `MULTI`, `EXEC`, `DISCARD`
//!
//! ### Server Commands
//! - `SELECT`, `COMPACT`, `DISCONNECT`

pub mod handler;
pub mod result;
pub mod session;

pub use handler::CommandHandler;
pub use result::{CommandResult, ExecError, Reply};
pub use session::{Session, SessionState};
