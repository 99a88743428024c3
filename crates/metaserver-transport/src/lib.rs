//! Transport abstraction layer for the metaserver.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the byte stream a lobby client talks over, and [`TcpTransport`], the raw
//! TCP implementation the server uses.
//!
//! A connection hands out whatever chunk of bytes the socket produced. It
//! knows nothing about frames: reassembling split frames and splitting
//! pipelined ones is the protocol layer's job.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport, connect};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// The lobby uses it as the key for everything that belongs to one client:
/// its session, its timers, its game membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Writes all of `data` to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the stream.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Flushes and shuts down the write side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}
