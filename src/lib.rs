//! # kvdb - An In-Memory Multi-Database Key-Value Server
//!
//! kvdb keeps string and integer values in a fixed number of independent
//! databases and serves them over a plain text line protocol. Every client
//! connection has its own session: a selected database and, optionally, a
//! queued `MULTI` transaction.
//!
//! ## Features
//!
//! - **Multiple Databases**: `SELECT` switches between independent keyspaces
//! - **Transactions**: `MULTI`/`EXEC`/`DISCARD` queue commands per session
//! - **Atomic Increments**: `INCR`/`INCRBY` never lose concurrent updates
//! - **Compaction**: `COMPACT` prints `SET` statements that rebuild a database
//! - **Async I/O**: Built on Tokio, one task per client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                kvdb                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │──> Session       │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │   (per client)   │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐   ┌──────────────────────────────┐  │
//! │  │   Line      │    │   Reply     │   │        StorageEngine         │  │
//! │  │   Parser    │    │  Renderer   │   │  ┌─────┐ ┌─────┐ ┌─────┐     │  │
//! │  └─────────────┘    └─────────────┘   │  │DB 0 │ │DB 1 │ │...N │     │  │
//! │                                       │  └─────┘ └─────┘ └─────┘     │  │
//! │                                       └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use kvdb::connection::ConnectionStats;
//! use kvdb::server;
//! use kvdb::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new(16));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     server::run(listener, storage, stats, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value`
//! - `GET key`
//! - `DEL key`
//! - `INCR key` / `INCRBY key delta`
//! - `MULTI` / `EXEC` / `DISCARD`
//! - `SELECT index`
//! - `COMPACT`
//! - `DISCONNECT`
//!
//! Arguments containing spaces are wrapped in double quotes:
//! `SET "multi word key" "multi word value"`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request line parser, command validation and reply rendering
//! - [`storage`]: Thread-safe multi-database storage engine
//! - [`commands`]: Execution engine and per-connection sessions
//! - [`connection`]: Client connection management
//! - [`server`]: Accept loop and graceful shutdown
//! - [`config`]: Environment and command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, CommandResult, Reply};
pub use config::{Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_line, Command, ParseError, Value};
pub use storage::StorageEngine;

/// The default port kvdb listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host kvdb binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of kvdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
