//! Everything the server says on the wire.
//!
//! Outbound traffic is a closed set of messages, so it's modelled as the
//! [`ServerMessage`] enum rather than as loose lists of strings. The engine
//! builds values of this enum; only [`ServerMessage::encode`] knows how
//! they are laid out as fields.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, encode_frame};

// ---------------------------------------------------------------------------
// Permission
// ---------------------------------------------------------------------------

/// A client's capability level.
///
/// Serialized in SCREAMING case both on the wire and in credential files:
/// `UNREGISTERED`, `REGISTERED`, `SUPERUSER`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Unregistered,
    Registered,
    Superuser,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "UNREGISTERED",
            Self::Registered => "REGISTERED",
            Self::Superuser => "SUPERUSER",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNREGISTERED" => Ok(Self::Unregistered),
            "REGISTERED" => Ok(Self::Registered),
            "SUPERUSER" => Ok(Self::Superuser),
            other => Err(ProtocolError::UnknownPermission(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster entries
// ---------------------------------------------------------------------------

/// How a chat line was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// To everyone in the lobby.
    Public,
    /// To one recipient only.
    Private,
    /// From the server itself (MOTD, announcements). Sender is empty.
    System,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::System => "system",
        }
    }
}

/// One row of a `CLIENTS` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    pub name: String,
    pub build_id: String,
    /// Name of the game the client is in, empty if none.
    pub game: String,
    pub permission: Permission,
}

/// One row of a `GAMES` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntry {
    pub name: String,
    pub host_build_id: String,
    /// Whether the liveness probe has confirmed the host.
    pub reachable: bool,
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// A message sent from the server to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Successful login: the assigned name and the permission level.
    Login { name: String, permission: Permission },
    /// Seconds since the server started.
    Time { uptime_secs: u64 },
    /// The client roster changed; ask again with `CLIENTS`.
    ClientsUpdate,
    /// The game list changed; ask again with `GAMES`.
    GamesUpdate,
    Clients(Vec<ClientEntry>),
    Games(Vec<GameEntry>),
    Chat {
        sender: String,
        message: String,
        kind: ChatKind,
    },
    Ping,
    Disconnect { reason: String },
    /// Relogin takeover succeeded.
    Relogin,
    /// The game passed its first liveness probe.
    GameOpen,
    /// Join accepted; connect to the host at this address.
    GameConnect { host_ip: IpAddr },
    GameStart,
    Error { scope: String, reason: String },
}

impl ServerMessage {
    /// Builds an `ERROR` message.
    pub fn error(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Error {
            scope: scope.into(),
            reason: reason.into(),
        }
    }

    /// Builds a system chat line (empty sender).
    pub fn system_chat(message: impl Into<String>) -> Self {
        Self::Chat {
            sender: String::new(),
            message: message.into(),
            kind: ChatKind::System,
        }
    }

    /// The command word this message starts with.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Time { .. } => "TIME",
            Self::ClientsUpdate => "CLIENTS_UPDATE",
            Self::GamesUpdate => "GAMES_UPDATE",
            Self::Clients(_) => "CLIENTS",
            Self::Games(_) => "GAMES",
            Self::Chat { .. } => "CHAT",
            Self::Ping => "PING",
            Self::Disconnect { .. } => "DISCONNECT",
            Self::Relogin => "RELOGIN",
            Self::GameOpen => "GAME_OPEN",
            Self::GameConnect { .. } => "GAME_CONNECT",
            Self::GameStart => "GAME_START",
            Self::Error { .. } => "ERROR",
        }
    }

    /// The message laid out as wire fields, command word first.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![self.name().to_string()];
        match self {
            Self::Login { name, permission } => {
                fields.push(name.clone());
                fields.push(permission.as_str().to_string());
            }
            Self::Time { uptime_secs } => fields.push(uptime_secs.to_string()),
            Self::Clients(entries) => {
                fields.push(entries.len().to_string());
                for entry in entries {
                    fields.push(entry.name.clone());
                    fields.push(entry.build_id.clone());
                    fields.push(entry.game.clone());
                    fields.push(entry.permission.as_str().to_string());
                    // Reserved column, always empty.
                    fields.push(String::new());
                }
            }
            Self::Games(entries) => {
                fields.push(entries.len().to_string());
                for entry in entries {
                    fields.push(entry.name.clone());
                    fields.push(entry.host_build_id.clone());
                    fields.push(entry.reachable.to_string());
                }
            }
            Self::Chat {
                sender,
                message,
                kind,
            } => {
                fields.push(sender.clone());
                fields.push(message.clone());
                fields.push(kind.as_str().to_string());
            }
            Self::Disconnect { reason } => fields.push(reason.clone()),
            Self::GameConnect { host_ip } => fields.push(host_ip.to_string()),
            Self::Error { scope, reason } => {
                fields.push(scope.clone());
                fields.push(reason.clone());
            }
            Self::ClientsUpdate
            | Self::GamesUpdate
            | Self::Ping
            | Self::Relogin
            | Self::GameOpen
            | Self::GameStart => {}
        }
        fields
    }

    /// Encodes the message as one complete frame.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.fields())
    }
}
