//! The lobby engine.
//!
//! [`MetaServer`] holds all lobby state and implements every rule, but it
//! never touches a socket or sleeps. The event loop feeds it what happened
//! (a connection opened, bytes arrived, a peer went away, a timer is due,
//! a probe finished) and then drains the [`Effect`]s it produced: frames
//! to write, connections to close, probes to start.
//!
//! Because time comes from a [`Clock`] and timeouts live in a [`Timers`]
//! queue, tests can run the whole lobby on a `ManualClock` and check
//! every byte it would have sent, without a runtime.
//!
//! ```text
//!            ┌──────────────┐  connect / receive / disconnected
//!  server ──►│  MetaServer  │  fire_timers / probe_finished
//!            │              │
//!  server ◄──│   effects    │  Send / Close / Probe
//!            └──────────────┘
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use metaserver_game::{GameId, GameRegistry};
use metaserver_protocol::{
    Command, CommandError, ConnectionId, FrameDecoder, ServerMessage,
};
use metaserver_session::{ClientRegistry, CredentialStore, SessionError};
use metaserver_timer::{Clock, Timers};

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// Effects and timers
// ---------------------------------------------------------------------------

/// Something the engine wants done in the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write one encoded frame to a connection.
    Send { to: ConnectionId, frame: Vec<u8> },
    /// Flush and close a connection.
    Close { conn: ConnectionId },
    /// Check that a hosted game answers on `addr`. Report back with
    /// [`MetaServer::probe_finished`].
    Probe { game: GameId, addr: SocketAddr },
}

/// What a pending deadline is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TimerKey {
    /// No inbound data for a while; time to ping.
    Idle(ConnectionId),
    /// A ping went unanswered.
    PingTimeout(ConnectionId),
    /// Relogin verification for this target connection.
    Relogin(ConnectionId),
    ProbeTimeout(GameId),
    Reprobe(GameId),
}

// ---------------------------------------------------------------------------
// Per-connection state
// ---------------------------------------------------------------------------

/// What the engine tracks for every open connection, logged in or not.
#[derive(Debug)]
pub(crate) struct Peer {
    pub(crate) addr: SocketAddr,
    pub(crate) decoder: FrameDecoder,
}

/// A relogin waiting to see whether its target is still alive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingRelogin {
    pub(crate) requester: ConnectionId,
}

// ---------------------------------------------------------------------------
// MetaServer
// ---------------------------------------------------------------------------

/// The sans-IO lobby state machine.
pub struct MetaServer<C, S> {
    pub(crate) config: ServerConfig,
    pub(crate) clock: C,
    pub(crate) credentials: S,
    started_at: Duration,
    pub(crate) peers: HashMap<ConnectionId, Peer>,
    pub(crate) clients: ClientRegistry,
    pub(crate) games: GameRegistry,
    pub(crate) timers: Timers<TimerKey>,
    /// Keyed by the connection being verified.
    pub(crate) relogins: HashMap<ConnectionId, PendingRelogin>,
    pub(crate) motd: Option<String>,
    effects: Vec<Effect>,
}

impl<C, S> MetaServer<C, S>
where
    C: Clock,
    S: CredentialStore,
{
    pub fn new(config: ServerConfig, clock: C, credentials: S) -> Self {
        let started_at = clock.now();
        let motd = config.motd.clone();
        Self {
            config,
            clock,
            credentials,
            started_at,
            peers: HashMap::new(),
            clients: ClientRegistry::new(),
            games: GameRegistry::new(),
            timers: Timers::new(),
            relogins: HashMap::new(),
            motd,
            effects: Vec::new(),
        }
    }

    // -- inputs -----------------------------------------------------------

    /// A new connection was accepted.
    pub fn connect(&mut self, id: ConnectionId, addr: SocketAddr) {
        tracing::debug!(conn_id = %id, %addr, "connection opened");
        self.peers.insert(
            id,
            Peer {
                addr,
                decoder: FrameDecoder::new(),
            },
        );
        let at = self.clock.now() + self.config.idle_timeout();
        self.timers.schedule(TimerKey::Idle(id), at);
    }

    /// Bytes arrived on a connection.
    ///
    /// Complete frames are handled one by one in arrival order; a partial
    /// frame stays buffered until the rest shows up.
    pub fn receive(&mut self, id: ConnectionId, data: &[u8]) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        peer.decoder.extend(data);
        self.note_activity(id);

        loop {
            let Some(peer) = self.peers.get_mut(&id) else {
                // A command closed the connection; drop the rest.
                return;
            };
            let Some(frame) = peer.decoder.next_frame() else {
                return;
            };
            match frame {
                Ok(fields) => match Command::parse(&fields) {
                    Ok(command) => self.dispatch(id, command),
                    Err(e) => self.send_command_error(id, &e),
                },
                Err(e) => {
                    tracing::debug!(conn_id = %id, error = %e, "malformed frame");
                    self.send_command_error(id, &CommandError::invalid_command());
                }
            }
        }
    }

    /// The peer closed the connection or the socket failed.
    pub fn disconnected(&mut self, id: ConnectionId) {
        self.close_connection(id, "peer closed");
    }

    /// Runs every timer whose deadline has passed.
    pub fn fire_timers(&mut self) {
        let now = self.clock.now();
        while let Some(key) = self.timers.pop_due(now) {
            self.on_timer(key);
        }
    }

    /// The earliest pending deadline, on the engine's clock.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// A probe started by [`Effect::Probe`] completed.
    ///
    /// Results that arrive after the probe already timed out are ignored.
    pub fn probe_finished(&mut self, game: GameId, alive: bool) {
        if !self.timers.cancel(&TimerKey::ProbeTimeout(game)) {
            tracing::debug!(%game, alive, "late probe result ignored");
            return;
        }
        if alive {
            self.probe_succeeded(game);
        } else {
            self.probe_failed(game);
        }
    }

    /// Takes everything the engine produced since the last call.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // -- inspection -------------------------------------------------------

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn games(&self) -> &GameRegistry {
        &self.games
    }

    /// Open connections, logged in or not.
    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    pub fn motd(&self) -> Option<&str> {
        self.motd.as_deref()
    }

    /// Whole seconds since the engine was created.
    pub fn uptime_secs(&self) -> u64 {
        self.clock.now().saturating_sub(self.started_at).as_secs()
    }

    // -- output helpers ---------------------------------------------------

    pub(crate) fn send(&mut self, to: ConnectionId, msg: &ServerMessage) {
        match msg.encode() {
            Ok(frame) => self.effects.push(Effect::Send { to, frame }),
            Err(e) => {
                tracing::warn!(conn_id = %to, message = msg.name(), error = %e, "dropping unencodable message");
            }
        }
    }

    /// Sends `msg` to every logged-in client, in login order.
    pub(crate) fn broadcast(&mut self, msg: &ServerMessage) {
        self.broadcast_except(msg, None);
    }

    pub(crate) fn broadcast_except(&mut self, msg: &ServerMessage, skip: Option<ConnectionId>) {
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(message = msg.name(), error = %e, "dropping unencodable broadcast");
                return;
            }
        };
        for to in self.clients.ids() {
            if Some(to) != skip {
                self.effects.push(Effect::Send {
                    to,
                    frame: frame.clone(),
                });
            }
        }
    }

    pub(crate) fn send_error(&mut self, to: ConnectionId, scope: &str, reason: &str) {
        self.send(to, &ServerMessage::error(scope, reason));
    }

    pub(crate) fn send_command_error(&mut self, to: ConnectionId, e: &CommandError) {
        tracing::debug!(conn_id = %to, scope = e.scope, reason = %e.reason, "command rejected");
        self.send_error(to, e.scope, &e.reason);
    }

    pub(crate) fn now(&self) -> Duration {
        self.clock.now()
    }

    // -- liveness ---------------------------------------------------------

    /// Any inbound data proves the connection is alive.
    fn note_activity(&mut self, id: ConnectionId) {
        self.timers.cancel(&TimerKey::PingTimeout(id));
        let at = self.clock.now() + self.config.idle_timeout();
        self.timers.schedule(TimerKey::Idle(id), at);

        if let Some(pending) = self.relogins.remove(&id) {
            self.timers.cancel(&TimerKey::Relogin(id));
            tracing::info!(target_conn = %id, requester = %pending.requester, "relogin target is still alive");
            self.send_error(pending.requester, Command::RELOGIN, "CONNECTION_STILL_ALIVE");
        }
    }

    fn on_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::Idle(id) => self.ping(id),
            TimerKey::PingTimeout(id) => {
                // A relogin waiting on this connection takes over at once.
                if self.relogins.contains_key(&id) {
                    self.timers.cancel(&TimerKey::Relogin(id));
                    tracing::info!(conn_id = %id, "ping unanswered, handing over to relogin");
                    if self.complete_relogin(id) {
                        return;
                    }
                }
                tracing::info!(conn_id = %id, "ping unanswered, dropping client");
                self.send(
                    id,
                    &ServerMessage::Disconnect {
                        reason: "CLIENT_TIMEOUT".into(),
                    },
                );
                self.close_connection(id, "timeout");
            }
            TimerKey::Relogin(target) => {
                self.complete_relogin(target);
            }
            TimerKey::ProbeTimeout(game) => {
                tracing::info!(%game, "probe timed out");
                self.probe_failed(game);
            }
            TimerKey::Reprobe(game) => self.start_probe(game, self.config.reprobe_timeout()),
        }
    }

    fn ping(&mut self, id: ConnectionId) {
        if !self.peers.contains_key(&id) {
            return;
        }
        self.send(id, &ServerMessage::Ping);
        let at = self.clock.now() + self.config.ping_timeout();
        self.timers.schedule(TimerKey::PingTimeout(id), at);
    }

    /// Closes a connection and runs the disconnection path: the client
    /// leaves the registry and its game, and everyone left hears about it.
    pub(crate) fn close_connection(&mut self, id: ConnectionId, why: &str) {
        if self.peers.remove(&id).is_none() {
            return;
        }
        tracing::debug!(conn_id = %id, why, "connection closed");
        self.effects.push(Effect::Close { conn: id });
        self.timers.cancel(&TimerKey::Idle(id));
        self.timers.cancel(&TimerKey::PingTimeout(id));

        // Relogins this connection asked for die with it.
        let requested: Vec<ConnectionId> = self
            .relogins
            .iter()
            .filter(|(_, pending)| pending.requester == id)
            .map(|(target, _)| *target)
            .collect();
        for target in requested {
            self.relogins.remove(&target);
            self.timers.cancel(&TimerKey::Relogin(target));
        }

        // A relogin waiting on this connection has nothing left to take over.
        if let Some(pending) = self.relogins.remove(&id) {
            self.timers.cancel(&TimerKey::Relogin(id));
            self.send_error(pending.requester, Command::RELOGIN, "NOT_LOGGED_IN");
        }

        if self.clients.remove(id).is_none() {
            return;
        }
        let dissolved = match self.games.leave(id) {
            Some(metaserver_game::Departure::Dissolved(game)) => {
                self.cancel_probes(game.id);
                true
            }
            _ => false,
        };
        self.broadcast(&ServerMessage::ClientsUpdate);
        if dissolved {
            self.broadcast(&ServerMessage::GamesUpdate);
        }
    }

    // -- relogin ----------------------------------------------------------

    /// The target stayed silent: hand its identity to the requester.
    ///
    /// Returns whether the handover happened. When it can't, the requester
    /// still gets an answer.
    fn complete_relogin(&mut self, target: ConnectionId) -> bool {
        let Some(PendingRelogin { requester }) = self.relogins.remove(&target) else {
            return false;
        };
        if !self.peers.contains_key(&requester) {
            return false;
        }
        if let Some(client) = self.clients.get(requester) {
            let e = SessionError::AlreadyLoggedIn(client.name.clone());
            self.send_error(requester, Command::RELOGIN, &e.reason());
            return false;
        }
        if !self.clients.contains(target) {
            self.send_error(requester, Command::RELOGIN, "NOT_LOGGED_IN");
            return false;
        }

        self.send(
            target,
            &ServerMessage::Disconnect {
                reason: "CLIENT_TIMEOUT".into(),
            },
        );
        self.clients.replace(target, requester);
        self.games.replace_member(target, requester);

        // The old connection goes away without a logout: its record lives
        // on under the new one.
        self.peers.remove(&target);
        self.effects.push(Effect::Close { conn: target });
        self.timers.cancel(&TimerKey::Idle(target));
        self.timers.cancel(&TimerKey::PingTimeout(target));

        self.broadcast_except(&ServerMessage::ClientsUpdate, Some(requester));
        self.send(requester, &ServerMessage::Relogin);
        true
    }

    // -- probes -----------------------------------------------------------

    /// Asks the event loop to probe `game`'s host, with a deadline.
    pub(crate) fn start_probe(&mut self, game: GameId, timeout: Duration) {
        let Some(host) = self.games.get(game).map(|g| g.host) else {
            return;
        };
        let Some(host_addr) = self.peers.get(&host).map(|p| p.addr) else {
            return;
        };
        let addr = SocketAddr::new(host_addr.ip(), self.config.game_port);
        let at = self.clock.now() + timeout;
        self.timers.schedule(TimerKey::ProbeTimeout(game), at);
        tracing::debug!(%game, %addr, "probing game host");
        self.effects.push(Effect::Probe { game, addr });
    }

    fn probe_succeeded(&mut self, game: GameId) {
        let first = self.games.confirm(game);
        if first {
            if let Some(host) = self.games.get(game).map(|g| g.host) {
                tracing::info!(%game, "game confirmed reachable");
                self.send(host, &ServerMessage::GameOpen);
            }
            self.broadcast(&ServerMessage::GamesUpdate);
        }
        if self.games.get(game).is_some() {
            let at = self.clock.now() + self.config.reprobe_interval();
            self.timers.schedule(TimerKey::Reprobe(game), at);
        }
    }

    /// The host didn't answer. The listing goes away; members keep the
    /// game name on their client record until they move on.
    fn probe_failed(&mut self, game: GameId) {
        self.cancel_probes(game);
        let Some(removed) = self.games.remove(game) else {
            return;
        };
        tracing::info!(%game, name = %removed.name, "game host unreachable");
        if !removed.reachable {
            self.send_error(removed.host, Command::GAME_OPEN, "GAME_TIMEOUT");
        }
        self.broadcast(&ServerMessage::GamesUpdate);
    }

    pub(crate) fn cancel_probes(&mut self, game: GameId) {
        self.timers.cancel(&TimerKey::ProbeTimeout(game));
        self.timers.cancel(&TimerKey::Reprobe(game));
    }
}
