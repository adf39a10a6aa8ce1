//! Connection Handler Module
//!
//! This module handles individual client connections to kvdb.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned with a fresh session
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Wait for bytes          │◄├──── shutdown signal ends the loop
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off complete line │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute, render, flush  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │    [Loop back / DISCONNECT]  │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / DISCONNECT / shutdown / error
//!        │
//!        ▼
//! 5. Handler task ends, session state is dropped
//! ```
//!
//! ## Buffer Management
//!
//! A BytesMut buffer accumulates incoming data. TCP is a stream protocol, so
//! one read may hold half a line or several lines at once. Lines end in `\n`
//! (an optional `\r` before it is stripped) and are decoded lossily as UTF-8.
//!
//! ## Shutdown
//!
//! The shutdown signal is only observed while waiting for more input. A line
//! that has already been read is always executed and its reply flushed.

use crate::commands::{CommandHandler, Reply};
use crate::protocol::render;
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Maximum length of a single request line (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    accepted: AtomicU64,
    active: AtomicU64,
    requests: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections accepted since startup
    pub accepted: u64,
    /// Connections currently open
    pub active: u64,
    /// Request lines executed
    pub requests: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }

    fn opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Listens for the server shutdown signal.
///
/// The signal fires once the sender publishes `true` or is dropped.
#[derive(Debug, Clone)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(notify: watch::Receiver<bool>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits until shutdown has been requested.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        // An error means the sender is gone, which is also a shutdown
        let _ = self.notify.wait_for(|&stop| stop).await;
        self.is_shutdown = true;
    }
}

/// The byte-level half of a connection: read buffer plus buffered writer.
struct LineStream<S> {
    stream: BufWriter<S>,
    buffer: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineStream<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
        }
    }

    /// Splits one complete line off the front of the buffer.
    ///
    /// A single read can carry a whole oversized line, so the limit is
    /// checked here as well as before each read.
    fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        if end >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        let mut line = self.buffer.split_to(end);
        self.buffer.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns the number of bytes read.
    async fn read_more_data(&mut self) -> Result<usize, ConnectionError> {
        // A full buffer with no newline in it is an oversized line
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        Ok(n)
    }

    /// Writes one rendered reply and flushes it.
    async fn write_reply(&mut self, text: &str) -> Result<(), ConnectionError> {
        self.stream.write_all(text.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so it can run on a `TcpStream` or on an
/// in-memory stream.
pub struct ConnectionHandler<S> {
    /// Framed transport for this connection
    connection: LineStream<S>,

    /// Peer address, used in log fields
    addr: SocketAddr,

    /// The command handler owning this client's session
    command_handler: CommandHandler,

    /// Shared counters
    stats: Arc<ConnectionStats>,

    /// Server shutdown signal
    shutdown: Shutdown,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionHandler<S> {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The transport for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `shutdown` - Server shutdown signal
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: Shutdown,
    ) -> Self {
        stats.opened();

        Self {
            connection: LineStream::new(stream),
            addr,
            command_handler,
            stats,
            shutdown,
        }
    }

    /// Serves the client until it goes away.
    ///
    /// Reads request lines from the client, executes them, and sends back
    /// replies until the client disconnects, sends `DISCONNECT`, the server
    /// shuts down, or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    info!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(err)
                    if err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                ConnectionError::BufferFull => {
                    error!(client = %self.addr, "Request line exceeds buffer size limit")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.closed();
        result
    }

    /// Reads lines, runs them, answers them.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.connection.next_line()? {
                trace!(
                    client = %self.addr,
                    remaining = self.connection.buffer.len(),
                    "Read request line"
                );

                let reply = self.command_handler.execute_line(&line);
                ConnectionStats::add(&self.stats.requests, 1);
                self.send_response(&reply).await?;

                if self.command_handler.session().is_closing() {
                    debug!(client = %self.addr, "Client requested disconnect");
                    return Ok(());
                }
            }

            tokio::select! {
                read = self.connection.read_more_data() => {
                    let n = read?;
                    ConnectionStats::add(&self.stats.bytes_in, n);
                    trace!(client = %self.addr, bytes = n, "Read data");
                }
                _ = self.shutdown.recv() => {
                    debug!(client = %self.addr, "Closing connection for shutdown");
                    return Ok(());
                }
            }
        }
    }

    /// Sends a reply to the client.
    async fn send_response(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let text = render(reply);
        self.connection.write_reply(&text).await?;
        ConnectionStats::add(&self.stats.bytes_out, text.len());
        trace!(
            client = %self.addr,
            bytes = text.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Reasons a connection loop ends abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the stream between requests
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Peer closed the stream mid-line
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Request line longer than the buffer size limit
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: Shutdown,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, shutdown);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref err)
                if err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn create_handler<S: AsyncRead + AsyncWrite + Unpin>(
        stream: S,
        shutdown: watch::Receiver<bool>,
    ) -> (ConnectionHandler<S>, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let storage = Arc::new(StorageEngine::new(16));
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            CommandHandler::new(Arc::clone(&storage)),
            Arc::clone(&stats),
            Shutdown::new(shutdown),
        );
        (handler, storage, stats)
    }

    #[tokio::test]
    async fn test_set_get_over_mock() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"SET name value\n")
            .write(b"OK\n")
            .read(b"GET name\r\n")
            .write(b"\"value\"\n")
            .build();

        let (handler, storage, _) = create_handler(stream, rx);
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(storage.len(0), 1);
    }

    #[tokio::test]
    async fn test_pipelined_lines_and_partial_reads() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"SET \"key\" \"5\"\nINCR \"ke")
            .write(b"OK\n")
            .read(b"y\"\nINCRBY \"key\" \"5\"\n")
            .write(b"(integer) 6\n")
            .write(b"(integer) 11\n")
            .build();

        let (handler, _, stats) = create_handler(stream, rx);
        let _ = handler.run().await;

        assert_eq!(stats.snapshot().requests, 3);
    }

    #[tokio::test]
    async fn test_blank_lines_get_a_reply() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"\n   \r\nSET k v\n")
            .write(b"(error) ERR unknown command \n")
            .write(b"(error) ERR unknown command \n")
            .write(b"OK\n")
            .build();

        let (handler, storage, stats) = create_handler(stream, rx);
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.snapshot().requests, 3);
        assert_eq!(storage.len(0), 1);
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"GET \"missing\"\nSET a \"b\nEXEC\nGET\n")
            .write(b"(nil)\n")
            .write(b"(error) ERR Syntax error: arguments has no closing quote\n")
            .write(b"(error) ERR EXEC without MULTI\n")
            .write(b"(error) ERR GET command expected 1 argument but none was given (i.e no Key)\n")
            .build();

        let (handler, _, _) = create_handler(stream, rx);
        let result = handler.run().await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
    }

    #[tokio::test]
    async fn test_transaction_reply_lines() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"MULTI\nSET k 5\nINCR k\nEXEC\n")
            .write(b"OK\n")
            .write(b"QUEUED\n")
            .write(b"QUEUED\n")
            .write(b"1) OK\n2) (integer) 6\n")
            .build();

        let (handler, storage, _) = create_handler(stream, rx);
        let _ = handler.run().await;

        assert_eq!(storage.get(0, "k"), Ok(crate::protocol::Value::Int(6)));
    }

    #[tokio::test]
    async fn test_disconnect_stops_processing() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new()
            .read(b"SET a 1\nDISCONNECT\nSET b 2\n")
            .write(b"OK\n")
            .write(b"OK\n")
            .build();

        let (handler, storage, stats) = create_handler(stream, rx);
        let result = handler.run().await;

        assert!(result.is_ok());
        assert_eq!(storage.len(0), 1);
        assert_eq!(stats.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_partial_line_at_eof() {
        let (_tx, rx) = watch::channel(false);
        let stream = Builder::new().read(b"GET key").build();

        let (handler, _, _) = create_handler(stream, rx);
        let result = handler.run().await;
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_oversized_line() {
        let (_tx, rx) = watch::channel(false);
        let chunk = vec![b'a'; MAX_BUFFER_SIZE];
        let stream = Builder::new().read(&chunk).build();

        let (handler, _, _) = create_handler(stream, rx);
        let result = handler.run().await;
        assert!(matches!(result, Err(ConnectionError::BufferFull)));
    }

    #[tokio::test]
    async fn test_oversized_line_in_one_read() {
        let mut lines = LineStream::new(Builder::new().build());
        lines.buffer.extend_from_slice(&vec![b'a'; MAX_BUFFER_SIZE + 16]);
        lines.buffer.extend_from_slice(b"\nGET a\n");

        assert!(matches!(lines.next_line(), Err(ConnectionError::BufferFull)));
    }

    #[tokio::test]
    async fn test_line_under_limit_is_accepted() {
        let mut lines = LineStream::new(Builder::new().build());
        lines.buffer.extend_from_slice(&vec![b'a'; MAX_BUFFER_SIZE - 1]);
        lines.buffer.extend_from_slice(b"\n");

        let line = lines.next_line().unwrap().unwrap();
        assert_eq!(line.len(), MAX_BUFFER_SIZE - 1);
        assert!(lines.next_line().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_while_idle() {
        let (tx, rx) = watch::channel(false);
        let (client, server) = tokio::io::duplex(1024);

        let (handler, _, stats) = create_handler(server, rx);
        let task = tokio::spawn(handler.run());

        let mut client = BufReader::new(client);
        client.write_all(b"SET a 1\n").await.unwrap();
        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line, "OK\n");

        tx.send(true).unwrap();
        let result = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(stats.snapshot().active, 0);

        // The server side is closed
        line.clear();
        assert_eq!(client.read_line(&mut line).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let mut shutdown = Shutdown::new(rx);
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
    }

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new(16));
        let stats = Arc::new(ConnectionStats::new());
        let (tx, rx) = watch::channel(false);

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            // Keeps the shutdown sender alive for the life of the listener
            let _tx = tx;
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                let shutdown = Shutdown::new(rx.clone());
                tokio::spawn(handle_connection(stream, client_addr, handler, stats, shutdown));
            }
        });

        (addr, storage, stats)
    }

    async fn read_reply_line(client: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _, _) = create_test_server().await;

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

        client.write_all(b"SET name \"kv db\"\n").await.unwrap();
        assert_eq!(read_reply_line(&mut client).await, "OK\n");

        client.write_all(b"GET name\n").await.unwrap();
        assert_eq!(read_reply_line(&mut client).await, "\"kv db\"\n");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (addr, storage, _) = create_test_server().await;

        let mut a = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let mut b = BufReader::new(TcpStream::connect(addr).await.unwrap());

        a.write_all(b"MULTI\n").await.unwrap();
        assert_eq!(read_reply_line(&mut a).await, "OK\n");
        a.write_all(b"SET k a\n").await.unwrap();
        assert_eq!(read_reply_line(&mut a).await, "QUEUED\n");

        b.write_all(b"SELECT 2\n").await.unwrap();
        assert_eq!(read_reply_line(&mut b).await, "OK\n");
        b.write_all(b"SET k b\n").await.unwrap();
        assert_eq!(read_reply_line(&mut b).await, "OK\n");
        b.write_all(b"EXEC\n").await.unwrap();
        assert_eq!(
            read_reply_line(&mut b).await,
            "(error) ERR EXEC without MULTI\n"
        );

        a.write_all(b"EXEC\n").await.unwrap();
        assert_eq!(read_reply_line(&mut a).await, "1) OK\n");

        assert_eq!(storage.get(0, "k"), Ok(crate::protocol::Value::string("a")));
        assert_eq!(storage.get(2, "k"), Ok(crate::protocol::Value::string("b")));
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.snapshot().active, 0);

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

        // Give the server time to accept the connection
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.snapshot().accepted, 1);
        assert_eq!(stats.snapshot().active, 1);

        client.write_all(b"SET a 1\n").await.unwrap();
        let _ = read_reply_line(&mut client).await;

        assert!(stats.snapshot().requests >= 1);
        assert!(stats.snapshot().bytes_in > 0);
        assert!(stats.snapshot().bytes_out > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.snapshot().active, 0);
    }
}
