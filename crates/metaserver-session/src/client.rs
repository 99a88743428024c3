//! The record kept for each logged-in client.

use metaserver_protocol::{ClientEntry, ConnectionId, Permission};

/// A logged-in lobby client.
///
/// The game is held by name only. The game registry owns games; if the
/// game goes away the name stays here until the client leaves, opens or
/// joins another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ConnectionId,
    /// Display name, unique among logged-in clients.
    pub name: String,
    pub build_id: String,
    pub protocol_version: u32,
    /// Whether the client logged in with a password.
    pub registered: bool,
    pub permission: Permission,
    pub game: Option<String>,
}

impl Client {
    /// The client's row in a `CLIENTS` reply.
    pub fn entry(&self) -> ClientEntry {
        ClientEntry {
            name: self.name.clone(),
            build_id: self.build_id.clone(),
            game: self.game.clone().unwrap_or_default(),
            permission: self.permission,
        }
    }
}
