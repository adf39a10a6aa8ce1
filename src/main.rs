//! kvdb - An In-Memory Multi-Database Key-Value Server
//!
//! This is the main entry point for the kvdb server.
//! It resolves the configuration, sets up the storage engine and TCP
//! listener, and serves clients until SIGINT or SIGTERM.

use anyhow::Context;
use kvdb::config::{Config, Startup};
use kvdb::connection::ConnectionStats;
use kvdb::server;
use kvdb::storage::StorageEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
kvdb - An In-Memory Multi-Database Key-Value Server

USAGE:
    kvdb [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>        Port to listen on (default: 6379)
    -d, --databases <N>      Number of databases (default: 16)
    -v, --version            Print version information
        --help               Print this help message

ENVIRONMENT:
    TCP_HOST, TCP_PORT, DB_COUNT   Defaults for the options above
    .env                           Read for any of these left unset
    RUST_LOG                       Log filter (default: info)

EXAMPLES:
    kvdb                           # Start on 127.0.0.1:6379
    kvdb --port 6380 -d 4          # Port 6380 with 4 databases
    kvdb --host 0.0.0.0            # Listen on all interfaces

CONNECTING:
    Any line-based TCP client works:
    $ nc 127.0.0.1 6379
    SET name "kv db"
    OK
    GET name
    "kv db"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
kvdb v{} - In-Memory Multi-Database Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {} with {} databases
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        kvdb::VERSION,
        config.bind_address(),
        config.db_count
    );
}

/// Completes on the first SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load().context("invalid configuration")? {
        Startup::Serve(config) => config,
        Startup::PrintHelp => {
            print_help();
            return Ok(());
        }
        Startup::PrintVersion => {
            println!("kvdb version {}", kvdb::VERSION);
            return Ok(());
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new(config.db_count));
    info!(databases = storage.db_count(), "Storage engine initialized");

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    print_banner(&config);

    server::run(listener, Arc::clone(&storage), Arc::clone(&stats), shutdown_signal()).await;

    let storage_stats = storage.stats();
    info!(
        keys = storage_stats.keys,
        gets = storage_stats.get_ops,
        sets = storage_stats.set_ops,
        dels = storage_stats.del_ops,
        "Storage statistics"
    );
    let connections = stats.snapshot();
    info!(
        accepted = connections.accepted,
        requests = connections.requests,
        bytes_in = connections.bytes_in,
        bytes_out = connections.bytes_out,
        "Connection statistics"
    );

    Ok(())
}
