//! A single advertised game.

use std::fmt;

use metaserver_protocol::{ConnectionId, GameEntry};

/// Identifies one game for its whole life.
///
/// Ids grow monotonically, so ordering by id is ordering by open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

/// A hosted game as the lobby sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    pub host: ConnectionId,
    pub host_build: String,
    pub max_players: u32,
    /// Everyone in the game, host first.
    pub members: Vec<ConnectionId>,
    /// Set once the host answered a liveness probe.
    pub reachable: bool,
    pub started: bool,
}

impl Game {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players as usize
    }

    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host == id
    }

    /// The game's row in a `GAMES` reply.
    pub fn entry(&self) -> GameEntry {
        GameEntry {
            name: self.name.clone(),
            host_build_id: self.host_build.clone(),
            reachable: self.reachable,
        }
    }
}
