//! Game registry: opens, tracks, and routes clients to games.

use std::collections::{BTreeMap, HashMap};

use metaserver_protocol::{ConnectionId, GameEntry};

use crate::{Game, GameError, GameId};

/// What [`GameRegistry::leave`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// A member left; the game lives on.
    Left(GameId),
    /// The host left, so the game is gone. Carries the removed game.
    Dissolved(Game),
}

/// All advertised games and who is in which.
///
/// This is the entry point for game operations from the engine.
#[derive(Debug, Default)]
pub struct GameRegistry {
    /// Keyed by id, which is also open order.
    games: BTreeMap<GameId, Game>,
    by_name: HashMap<String, GameId>,
    /// Maps each client to the game it's in.
    /// A client can be in at most ONE game at a time (key invariant).
    memberships: HashMap<ConnectionId, GameId>,
    next_id: u64,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new, unconfirmed game hosted by `host`.
    ///
    /// # Errors
    /// - [`GameError::GameExists`] if the name is taken.
    /// - [`GameError::AlreadyInGame`] if the host is in a game already.
    pub fn open(
        &mut self,
        name: &str,
        host: ConnectionId,
        host_build: &str,
        max_players: u32,
    ) -> Result<GameId, GameError> {
        if let Some(current) = self.game_of(host) {
            return Err(GameError::AlreadyInGame(current.name.clone()));
        }
        if self.by_name.contains_key(name) {
            return Err(GameError::GameExists(name.to_string()));
        }

        self.next_id += 1;
        let id = GameId(self.next_id);
        let game = Game {
            id,
            name: name.to_string(),
            host,
            host_build: host_build.to_string(),
            max_players,
            members: vec![host],
            reachable: false,
            started: false,
        };
        self.games.insert(id, game);
        self.by_name.insert(name.to_string(), id);
        self.memberships.insert(host, id);

        tracing::info!(%id, game = name, host = %host, max_players, "game opened");
        Ok(id)
    }

    /// Adds `member` to the game called `name`.
    ///
    /// # Errors
    /// - [`GameError::AlreadyInGame`] if `member` is in a game already.
    /// - [`GameError::NoSuchGame`] if there's no such game or it hasn't
    ///   been confirmed reachable yet.
    /// - [`GameError::GameFull`] if it has no free slot.
    pub fn join(&mut self, name: &str, member: ConnectionId) -> Result<&Game, GameError> {
        if let Some(current) = self.game_of(member) {
            return Err(GameError::AlreadyInGame(current.name.clone()));
        }
        let no_such_game = || GameError::NoSuchGame(name.to_string());

        let id = *self.by_name.get(name).ok_or_else(no_such_game)?;
        let game = self.games.get_mut(&id).ok_or_else(no_such_game)?;
        if !game.reachable {
            return Err(no_such_game());
        }
        if game.is_full() {
            return Err(GameError::GameFull(name.to_string()));
        }

        game.members.push(member);
        self.memberships.insert(member, id);
        tracing::debug!(%id, game = name, %member, "client joined game");
        Ok(game)
    }

    /// Takes `member` out of its game. If it was the host, the whole game
    /// is removed.
    ///
    /// Returns `None` if `member` wasn't in a game.
    pub fn leave(&mut self, member: ConnectionId) -> Option<Departure> {
        let id = *self.memberships.get(&member)?;
        let is_host = self.games.get(&id).is_some_and(|g| g.is_host(member));

        if is_host {
            return self.remove(id).map(Departure::Dissolved);
        }

        self.memberships.remove(&member);
        if let Some(game) = self.games.get_mut(&id) {
            game.members.retain(|m| *m != member);
            tracing::debug!(%id, game = %game.name, %member, "client left game");
        }
        Some(Departure::Left(id))
    }

    /// Marks `member`'s game as started.
    ///
    /// # Errors
    /// - [`GameError::NotInGame`] if `member` isn't in a game.
    /// - [`GameError::DeficientPermission`] if `member` isn't the host.
    pub fn start(&mut self, member: ConnectionId) -> Result<&Game, GameError> {
        let id = *self.memberships.get(&member).ok_or(GameError::NotInGame)?;
        let game = self.games.get_mut(&id).ok_or(GameError::NotInGame)?;
        if !game.is_host(member) {
            return Err(GameError::DeficientPermission);
        }
        game.started = true;
        tracing::info!(%id, game = %game.name, "game started");
        Ok(game)
    }

    /// Removes a game outright, releasing all its members.
    pub fn remove(&mut self, id: GameId) -> Option<Game> {
        let game = self.games.remove(&id)?;
        self.by_name.remove(&game.name);
        for member in &game.members {
            self.memberships.remove(member);
        }
        tracing::info!(%id, game = %game.name, "game closed");
        Some(game)
    }

    /// Records a successful probe. Returns whether the game was
    /// unconfirmed until now.
    pub fn confirm(&mut self, id: GameId) -> bool {
        match self.games.get_mut(&id) {
            Some(game) => {
                let first = !game.reachable;
                game.reachable = true;
                first
            }
            None => false,
        }
    }

    /// Hands `old`'s membership (and hosting) over to `new`. Used by
    /// relogin takeovers. Returns the affected game, if any.
    pub fn replace_member(&mut self, old: ConnectionId, new: ConnectionId) -> Option<GameId> {
        let id = self.memberships.remove(&old)?;
        self.memberships.insert(new, id);
        if let Some(game) = self.games.get_mut(&id) {
            for member in &mut game.members {
                if *member == old {
                    *member = new;
                }
            }
            if game.host == old {
                game.host = new;
            }
        }
        Some(id)
    }

    pub fn get(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Game> {
        self.by_name.get(name).and_then(|id| self.games.get(id))
    }

    /// The live game `member` is in.
    pub fn game_of(&self, member: ConnectionId) -> Option<&Game> {
        self.memberships
            .get(&member)
            .and_then(|id| self.games.get(id))
    }

    /// Games in open order.
    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    /// The `GAMES` reply rows.
    pub fn listing(&self) -> Vec<GameEntry> {
        self.iter().map(Game::entry).collect()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
