//! Multi-Database Storage Engine
//!
//! This module implements the shared in-memory store. It holds a fixed number
//! of independent logical databases, selected by index, each one a plain
//! `HashMap` from string key to [`Value`].
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │  DB 0   │ │  DB 1   │ │  DB 2   │ │  DB N-1 │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every database has its own lock, so sessions working on different
//! databases never contend. Read-modify-write sequences (`INCR`) go through
//! [`StorageEngine::update`], which holds the write lock for the whole
//! sequence so concurrent increments are never lost.
//!
//! Database indices passed to the per-key operations are expected to be
//! validated already (see [`StorageEngine::select_index`]).

use crate::protocol::types::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Number of databases created when none (or zero) is configured.
pub const DEFAULT_DB_COUNT: usize = 16;

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Key {0:?} not found in storage")]
    KeyNotFound(String),

    /// The stored value (or an increment) is not a base-10 integer
    #[error("value is not an integer")]
    ValueNotInteger,

    /// A database index that does not parse as an integer
    #[error("value is not an integer or out of range")]
    IndexNotInteger,

    #[error("DB index is out of range")]
    IndexOutOfRange,

    #[error("increment or decrement would overflow")]
    Overflow,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// One logical database.
#[derive(Debug, Default)]
struct Database {
    entries: RwLock<HashMap<String, Value>>,
}

impl Database {
    // Every mutation is a single insert/remove/replace, so a poisoned map is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The main storage engine.
///
/// Designed to be wrapped in an `Arc` and shared across all connection
/// tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use kvdb::storage::StorageEngine;
/// use kvdb::protocol::types::Value;
///
/// let engine = StorageEngine::new(4);
///
/// engine.set(0, "name", Value::string("Ada"));
/// assert_eq!(engine.get(0, "name"), Ok(Value::string("Ada")));
///
/// // Databases are independent
/// assert!(engine.get(1, "name").is_err());
/// ```
pub struct StorageEngine {
    databases: Vec<Database>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("databases", &self.databases.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DB_COUNT)
    }
}

impl StorageEngine {
    /// Creates a storage engine with `db_count` databases.
    ///
    /// A count of zero falls back to [`DEFAULT_DB_COUNT`].
    pub fn new(db_count: usize) -> Self {
        let db_count = if db_count == 0 {
            DEFAULT_DB_COUNT
        } else {
            db_count
        };

        Self {
            databases: (0..db_count).map(|_| Database::default()).collect(),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
        }
    }

    /// Number of logical databases.
    pub fn db_count(&self) -> usize {
        self.databases.len()
    }

    #[inline]
    fn database(&self, db: usize) -> &Database {
        &self.databases[db]
    }

    /// Validates a raw database index.
    ///
    /// The index must parse as an integer and lie in `[0, db_count)`.
    pub fn select_index(&self, raw: &str) -> StorageResult<usize> {
        let index: i64 = raw.parse().map_err(|_| StorageError::IndexNotInteger)?;

        usize::try_from(index)
            .ok()
            .filter(|index| *index < self.db_count())
            .ok_or(StorageError::IndexOutOfRange)
    }

    /// Stores a value, overwriting any previous one.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, db: usize, key: impl Into<String>, value: Value) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        self.database(db).write().insert(key.into(), value).is_none()
    }

    /// Fetches a copy of the value stored under `key`.
    pub fn get(&self, db: usize, key: &str) -> StorageResult<Value> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        self.database(db)
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    /// Removes a key, returning the value it held.
    pub fn delete(&self, db: usize, key: &str) -> StorageResult<Value> {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        self.database(db)
            .write()
            .remove(key)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    /// Atomically reads and modifies an existing value.
    ///
    /// The database write lock is held while `f` runs, so no other mutator
    /// can interleave. If `f` fails, the stored value must be left untouched
    /// by the closure; the error is returned as-is.
    pub fn update<T, F>(&self, db: usize, key: &str, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Value) -> StorageResult<T>,
    {
        let mut entries = self.database(db).write();
        let value = entries
            .get_mut(key)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;
        f(value)
    }

    /// Copies every pair of a database under its read lock.
    ///
    /// The returned vector is a point-in-time snapshot; later writes do not
    /// show up in it. Order is unspecified.
    pub fn snapshot(&self, db: usize) -> Vec<(String, Value)> {
        self.database(db)
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Iterates over a snapshot of a database taken at call time.
    pub fn iter(&self, db: usize) -> impl Iterator<Item = (String, Value)> {
        self.snapshot(db).into_iter()
    }

    /// Number of keys in one database.
    pub fn len(&self, db: usize) -> usize {
        self.database(db).read().len()
    }

    /// Returns true if one database holds no keys.
    pub fn is_empty(&self, db: usize) -> bool {
        self.len(db) == 0
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            databases: self.db_count(),
            keys: self.databases.iter().map(|db| db.read().len() as u64).sum(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the storage engine.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub databases: usize,
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
}
