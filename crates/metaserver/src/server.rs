//! `Server` builder and event loop.
//!
//! This is the entry point for running a lobby. It ties the layers
//! together: transport → engine → transport, with the prober on the side.
//!
//! One task owns the [`MetaServer`] engine. Every connection gets a reader
//! task that forwards raw bytes into the loop and a writer task that drains
//! an outbound queue, so the engine itself never waits on a socket.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use metaserver_game::GameId;
use metaserver_protocol::ConnectionId;
use metaserver_session::CredentialStore;
use metaserver_timer::TokioClock;
use metaserver_transport::{Connection, TcpConnection, TcpTransport, Transport};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::engine::{Effect, MetaServer};
use crate::{MetaserverError, prober};

/// What the connection and probe tasks report back to the loop.
#[derive(Debug)]
enum Event {
    Data(ConnectionId, Vec<u8>),
    Closed(ConnectionId),
    ProbeDone(GameId, bool),
}

/// What the loop asks a connection's writer task to do.
#[derive(Debug)]
enum Outbound {
    Frame(Vec<u8>),
    Close,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,ignore
/// use metaserver::prelude::*;
///
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:7395")
///     .build(MemoryCredentials::new())
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Validates the configuration and binds the listening socket.
    pub async fn build<S: CredentialStore>(
        self,
        credentials: S,
    ) -> Result<Server<S>, MetaserverError> {
        self.config.validate()?;
        let transport = TcpTransport::bind(&self.config.bind).await?;
        Ok(Server {
            transport,
            config: self.config,
            credentials,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound lobby server.
///
/// Call [`run()`](Self::run) to start accepting clients.
pub struct Server<S: CredentialStore> {
    transport: TcpTransport,
    config: ServerConfig,
    credentials: S,
}

impl<S: CredentialStore> Server<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, MetaserverError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the lobby until the process is terminated.
    pub async fn run(self) -> Result<(), MetaserverError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the lobby until `shutdown` completes.
    ///
    /// Open connections are dropped with the loop; clients see EOF.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), MetaserverError>
    where
        F: Future<Output = ()>,
    {
        let clock = TokioClock::new();
        let probe_io_timeout = self
            .config
            .probe_timeout()
            .max(self.config.reprobe_timeout());
        let mut engine = MetaServer::new(self.config, clock, self.credentials);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut writers: HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>> = HashMap::new();

        tracing::info!(addr = ?self.transport.local_addr().ok(), "metaserver running");
        tokio::pin!(shutdown);

        loop {
            let deadline = engine.next_deadline().map(|at| clock.instant_at(at));

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutting down");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let id = conn.id();
                        engine.connect(id, conn.peer_addr());
                        writers.insert(id, spawn_connection(conn, events_tx.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                Some(event) = events_rx.recv() => match event {
                    Event::Data(id, data) => engine.receive(id, &data),
                    Event::Closed(id) => engine.disconnected(id),
                    Event::ProbeDone(game, alive) => engine.probe_finished(game, alive),
                },
                () = sleep_until(deadline) => engine.fire_timers(),
            }

            for effect in engine.take_effects() {
                match effect {
                    Effect::Send { to, frame } => {
                        if let Some(tx) = writers.get(&to) {
                            let _ = tx.send(Outbound::Frame(frame));
                        }
                    }
                    Effect::Close { conn } => {
                        if let Some(tx) = writers.remove(&conn) {
                            let _ = tx.send(Outbound::Close);
                        }
                    }
                    Effect::Probe { game, addr } => {
                        let tx = events_tx.clone();
                        tokio::spawn(async move {
                            let alive = prober::probe(addr, probe_io_timeout).await;
                            let _ = tx.send(Event::ProbeDone(game, alive));
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns the reader and writer tasks for one connection and returns the
/// writer's queue.
fn spawn_connection(
    conn: TcpConnection,
    events: mpsc::UnboundedSender<Event>,
) -> mpsc::UnboundedSender<Outbound> {
    let id = conn.id();
    let conn = Arc::new(conn);

    let reader_conn = Arc::clone(&conn);
    let reader_events = events.clone();
    let reader = tokio::spawn(async move {
        loop {
            match reader_conn.recv().await {
                Ok(Some(data)) => {
                    if reader_events.send(Event::Data(id, data)).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(conn_id = %id, error = %e, "read failed");
                    break;
                }
            }
        }
        let _ = reader_events.send(Event::Closed(id));
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(frame) => {
                    if let Err(e) = conn.send(&frame).await {
                        tracing::debug!(conn_id = %id, error = %e, "write failed");
                        let _ = events.send(Event::Closed(id));
                        break;
                    }
                }
                Outbound::Close => {
                    if let Err(e) = conn.close().await {
                        tracing::debug!(conn_id = %id, error = %e, "close failed");
                    }
                    break;
                }
            }
        }
        // The engine is done with this connection; stop reading too.
        reader.abort();
    });

    tx
}
