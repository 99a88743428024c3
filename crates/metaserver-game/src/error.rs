//! Error types for the game layer.

/// Errors that can occur during game operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Another game already uses this name.
    #[error("game {0:?} already exists")]
    GameExists(String),

    /// No joinable game with this name. Covers games still waiting for
    /// their first probe.
    #[error("no such game: {0:?}")]
    NoSuchGame(String),

    /// The game has as many members as it allows.
    #[error("game {0:?} is full")]
    GameFull(String),

    /// Only the host may do this.
    #[error("only the host may do this")]
    DeficientPermission,

    /// The client isn't a member of any live game.
    #[error("not in a game")]
    NotInGame,

    /// The client is already a member of a live game.
    #[error("already in game {0:?}")]
    AlreadyInGame(String),
}

impl GameError {
    /// The wire reason for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::GameExists(_) => "GAME_EXISTS",
            Self::NoSuchGame(_) => "NO_SUCH_GAME",
            Self::GameFull(_) => "GAME_FULL",
            Self::DeficientPermission => "DEFICIENT_PERMISSION",
            Self::NotInGame | Self::AlreadyInGame(_) => "INVALID_CMD",
        }
    }

    /// Whether the client sent a command that makes no sense in its
    /// state, reported as `GARBAGE_RECEIVED` rather than under the
    /// command's own scope.
    pub fn is_invalid_command(&self) -> bool {
        matches!(self, Self::NotInGame | Self::AlreadyInGame(_))
    }
}
