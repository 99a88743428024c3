//! Command handlers: one method per [`Command`] variant.
//!
//! The flow for every frame is:
//!   1. `receive` parses it into a `Command`
//!   2. `dispatch` checks it's allowed in the connection's state
//!   3. the matching `handle_*` method applies it and queues replies

use metaserver_game::{Departure, GameError};
use metaserver_protocol::{
    ChatKind, Command, CommandError, ConnectionId, Credentials, ServerMessage,
};
use metaserver_session::{
    CredentialStore, Privilege, SessionError, authorize, check_relogin, permits,
};
use metaserver_timer::Clock;

use crate::engine::{MetaServer, PendingRelogin, TimerKey};

/// Escapes chat text for clients that render it as markup.
fn escape_chat(message: &str) -> String {
    message.replace('<', "&lt;")
}

impl<C, S> MetaServer<C, S>
where
    C: Clock,
    S: CredentialStore,
{
    pub(crate) fn dispatch(&mut self, id: ConnectionId, command: Command) {
        tracing::debug!(conn_id = %id, command = command.name(), "command received");

        if !command.allowed_before_login() && !self.clients.contains(id) {
            self.send_command_error(id, &CommandError::invalid_command());
            return;
        }

        match command {
            Command::Login(creds) => self.handle_login(id, creds),
            Command::Relogin(creds) => self.handle_relogin(id, creds),
            // Activity was already recorded when the bytes arrived.
            Command::Pong => {}
            Command::Disconnect { reason } => {
                tracing::info!(conn_id = %id, reason = reason.as_deref().unwrap_or(""), "client disconnected");
                self.close_connection(id, "client request");
            }
            Command::Chat { message, recipient } => self.handle_chat(id, &message, recipient),
            Command::Motd(text) => self.handle_motd(id, text),
            Command::Announcement(text) => self.handle_announcement(id, text),
            Command::Clients => {
                let roster = self.clients.roster();
                self.send(id, &ServerMessage::Clients(roster));
            }
            Command::Games => {
                let listing = self.games.listing();
                self.send(id, &ServerMessage::Games(listing));
            }
            Command::GameOpen { name, max_players } => {
                self.handle_game_open(id, name, max_players);
            }
            Command::GameConnect { name } => self.handle_game_connect(id, name),
            Command::GameStart => self.handle_game_start(id),
            Command::GameDisconnect => self.handle_game_disconnect(id),
        }
    }

    fn session_error(&mut self, id: ConnectionId, scope: &str, e: &SessionError) {
        tracing::debug!(conn_id = %id, scope, error = %e, "request refused");
        self.send_error(id, scope, &e.reason());
    }

    fn game_error(&mut self, id: ConnectionId, scope: &str, e: &GameError) {
        if e.is_invalid_command() {
            self.send_command_error(id, &CommandError::invalid_command());
        } else {
            tracing::debug!(conn_id = %id, scope, error = %e, "game request refused");
            self.send_error(id, scope, e.reason());
        }
    }

    // -- LOGIN / RELOGIN --------------------------------------------------

    fn handle_login(&mut self, id: ConnectionId, creds: Credentials) {
        const SCOPE: &str = Command::LOGIN;

        if let Some(client) = self.clients.get(id) {
            let e = SessionError::AlreadyLoggedIn(client.name.clone());
            return self.session_error(id, SCOPE, &e);
        }
        if !self.config.supports_protocol(creds.protocol_version) {
            let e = SessionError::UnsupportedProtocol(creds.protocol_version);
            return self.session_error(id, SCOPE, &e);
        }
        let permission = match authorize(&self.credentials, &creds) {
            Ok(permission) => permission,
            Err(e) => return self.session_error(id, SCOPE, &e),
        };

        let store = &self.credentials;
        let reserve = self.config.reserve_registered_names;
        let name = match self.clients.login(id, &creds, permission, |name| {
            reserve && store.is_registered(name)
        }) {
            Ok(client) => client.name.clone(),
            Err(e) => return self.session_error(id, SCOPE, &e),
        };

        self.send(id, &ServerMessage::Login { name, permission });
        let uptime_secs = self.uptime_secs();
        self.send(id, &ServerMessage::Time { uptime_secs });
        self.broadcast(&ServerMessage::ClientsUpdate);
        if let Some(motd) = self.motd.clone() {
            self.send(id, &ServerMessage::system_chat(motd));
        }
    }

    fn handle_relogin(&mut self, id: ConnectionId, creds: Credentials) {
        const SCOPE: &str = Command::RELOGIN;

        if let Some(client) = self.clients.get(id) {
            let e = SessionError::AlreadyLoggedIn(client.name.clone());
            return self.session_error(id, SCOPE, &e);
        }
        if let Some(target) = self.pending_relogin_of(id) {
            return self.session_error(id, SCOPE, &SessionError::ReloginPending(target));
        }
        let Some(existing) = self.clients.by_name(&creds.name) else {
            let e = SessionError::NotLoggedIn(creds.name.clone());
            return self.session_error(id, SCOPE, &e);
        };
        if let Err(e) = check_relogin(&self.credentials, existing, &creds) {
            return self.session_error(id, SCOPE, &e);
        }
        let target = existing.id;
        if self.relogins.contains_key(&target) {
            return self.send_error(id, SCOPE, "CONNECTION_STILL_ALIVE");
        }

        tracing::info!(requester = %id, target_conn = %target, name = %creds.name, "relogin requested, checking old connection");
        self.relogins.insert(target, PendingRelogin { requester: id });
        self.send(target, &ServerMessage::Ping);
        let at = self.now() + self.config.relogin_timeout();
        self.timers.schedule(TimerKey::Relogin(target), at);
    }

    /// The target of a relogin `id` is already waiting on, if any.
    fn pending_relogin_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.relogins
            .iter()
            .find(|(_, pending)| pending.requester == id)
            .map(|(target, _)| *target)
    }

    // -- chat -------------------------------------------------------------

    fn handle_chat(&mut self, id: ConnectionId, message: &str, recipient: Option<String>) {
        let Some(sender) = self.clients.get(id).map(|c| c.name.clone()) else {
            return;
        };
        let message = escape_chat(message);

        match recipient {
            None => self.broadcast(&ServerMessage::Chat {
                sender,
                message,
                kind: ChatKind::Public,
            }),
            Some(recipient) => {
                let Some(to) = self.clients.by_name(&recipient).map(|c| c.id) else {
                    tracing::debug!(conn_id = %id, %recipient, "private chat to offline client dropped");
                    return;
                };
                self.send(
                    to,
                    &ServerMessage::Chat {
                        sender,
                        message,
                        kind: ChatKind::Private,
                    },
                );
            }
        }
    }

    fn require(&mut self, id: ConnectionId, scope: &str, privilege: Privilege) -> bool {
        let allowed = self
            .clients
            .get(id)
            .is_some_and(|c| permits(c.permission, privilege));
        if !allowed {
            self.session_error(id, scope, &SessionError::DeficientPermission);
        }
        allowed
    }

    fn handle_motd(&mut self, id: ConnectionId, text: String) {
        if !self.require(id, Command::MOTD, Privilege::SetMotd) {
            return;
        }
        tracing::info!(conn_id = %id, "message of the day changed");
        self.broadcast(&ServerMessage::system_chat(text.clone()));
        self.motd = Some(text);
    }

    fn handle_announcement(&mut self, id: ConnectionId, text: String) {
        if !self.require(id, Command::ANNOUNCEMENT, Privilege::Announce) {
            return;
        }
        self.broadcast(&ServerMessage::system_chat(text));
    }

    // -- games ------------------------------------------------------------

    fn handle_game_open(&mut self, id: ConnectionId, name: String, max_players: u32) {
        let Some(build_id) = self.clients.get(id).map(|c| c.build_id.clone()) else {
            return;
        };
        let game = match self.games.open(&name, id, &build_id, max_players) {
            Ok(game) => game,
            Err(e) => return self.game_error(id, Command::GAME_OPEN, &e),
        };

        self.clients.set_game(id, Some(name));
        self.broadcast(&ServerMessage::GamesUpdate);
        self.broadcast(&ServerMessage::ClientsUpdate);
        let timeout = self.config.probe_timeout();
        self.start_probe(game, timeout);
    }

    fn handle_game_connect(&mut self, id: ConnectionId, name: String) {
        let host = match self.games.join(&name, id) {
            Ok(game) => game.host,
            Err(e) => return self.game_error(id, Command::GAME_CONNECT, &e),
        };
        let Some(host_ip) = self.peers.get(&host).map(|p| p.addr.ip()) else {
            return;
        };

        self.clients.set_game(id, Some(name));
        self.send(id, &ServerMessage::GameConnect { host_ip });
        self.broadcast(&ServerMessage::ClientsUpdate);
    }

    fn handle_game_start(&mut self, id: ConnectionId) {
        if let Err(e) = self.games.start(id) {
            return self.game_error(id, Command::GAME_START, &e);
        }
        self.send(id, &ServerMessage::GameStart);
        self.broadcast(&ServerMessage::GamesUpdate);
    }

    fn handle_game_disconnect(&mut self, id: ConnectionId) {
        match self.games.leave(id) {
            Some(Departure::Left(_)) => {
                self.clients.set_game(id, None);
                self.broadcast(&ServerMessage::ClientsUpdate);
            }
            Some(Departure::Dissolved(game)) => {
                self.cancel_probes(game.id);
                self.clients.set_game(id, None);
                self.broadcast(&ServerMessage::ClientsUpdate);
                self.broadcast(&ServerMessage::GamesUpdate);
            }
            // The game is already gone; only a stale name is left to clear.
            None if self.clients.set_game(id, None) => {
                self.broadcast(&ServerMessage::ClientsUpdate);
            }
            None => self.send_command_error(id, &CommandError::invalid_command()),
        }
    }
}
