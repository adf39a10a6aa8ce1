//! TCP Server
//!
//! Accepts clients and runs one [`handle_connection`] task per client until
//! the shutdown future completes.
//!
//! ## Shutdown Sequence
//!
//! ```text
//! shutdown future completes
//!        │
//!        ▼
//! stop accepting, drop the listener
//!        │
//!        ▼
//! publish `true` on the watch channel ──> idle connections close
//!        │
//!        ▼
//! await every task in the JoinSet
//! ```
//!
//! Connections busy with a request finish it and flush the reply before they
//! notice the signal.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats, Shutdown};
use crate::storage::StorageEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Runs the accept loop until `shutdown` completes, then drains every
/// connection.
pub async fn run(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    shutdown: impl Future<Output = ()>,
) {
    let (notify_shutdown, _) = watch::channel(false);
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let handler = CommandHandler::new(Arc::clone(&storage));
                    let stats = Arc::clone(&stats);
                    let shutdown = Shutdown::new(notify_shutdown.subscribe());

                    connections.spawn(handle_connection(stream, addr, handler, stats, shutdown));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            },
            // Reap finished connections so the set only holds live ones
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Connection task failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping server...");
                break;
            }
        }
    }

    drop(listener);
    notify_shutdown.send_replace(true);

    info!(connections = connections.len(), "Waiting for open connections to close");
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Connection task failed");
        }
    }

    info!("Server shutdown complete");
}
