//! Storage Engine Module
//!
//! This module provides the shared, in-memory storage for kvdb: a fixed
//! number of independent logical databases selected by index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │  DB 0   │ │  DB 1   │ │  DB 2   │ │...16    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ dbs     │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲               ▲               ▲
//!        │               │               │
//!    session A       session B       session C
//! ```
//!
//! ## Features
//!
//! - **Independent Databases**: one lock per database, no cross-database operations
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Atomic Updates**: read-modify-write under a single write lock
//! - **Snapshots**: iteration copies the database first, never streams live
//!
//! ## Example
//!
//! ```
//! use kvdb::storage::StorageEngine;
//! use kvdb::protocol::types::Value;
//!
//! let engine = StorageEngine::new(16);
//! let db = engine.select_index("3").unwrap();
//!
//! engine.set(db, "counter", Value::string("5"));
//! let next = engine.update(db, "counter", |value| {
//!     let n = value.to_integer().unwrap_or_default() + 1;
//!     *value = Value::integer(n);
//!     Ok(n)
//! });
//! assert_eq!(next, Ok(6));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageError, StorageResult, StorageStats, DEFAULT_DB_COUNT};
