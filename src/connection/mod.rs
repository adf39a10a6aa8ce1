//! Connection Handler Module
//!
//! This module manages individual client connections to kvdb.
//! Each client connection is handled by its own async task, allowing
//! the server to handle thousands of concurrent clients efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Split line  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sessions**: Every connection owns its own selected database and
//!   transaction queue
//! - **Pipelining**: Several request lines in a single TCP packet are
//!   answered in order
//! - **Graceful shutdown**: Idle connections close when the server stops
//! - **Statistics**: Tracks connection and command metrics
//!
//! ## Example
//!
//! ```ignore
//! use kvdb::connection::{handle_connection, ConnectionStats, Shutdown};
//! use kvdb::commands::CommandHandler;
//! use kvdb::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! let storage = Arc::new(StorageEngine::new(16));
//! let stats = Arc::new(ConnectionStats::new());
//! let (_notify, shutdown) = watch::channel(false);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&storage));
//! tokio::spawn(handle_connection(stream, addr, handler, stats, Shutdown::new(shutdown)));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, Shutdown,
    StatsSnapshot,
};
