//! Inbound commands.
//!
//! The first field of a frame names the command; the rest are positional
//! arguments. [`Command::parse`] turns the raw fields into one variant of
//! a closed enum, so the engine can `match` on it and the compiler checks
//! that every command has a handler.

use crate::CommandError;

/// What a client presents on `LOGIN` and `RELOGIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub protocol_version: u32,
    pub name: String,
    pub build_id: String,
    /// Whether the client claims to be a registered user.
    pub registered: bool,
    /// Present only when `registered` is set.
    pub password: Option<String>,
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Credentials),
    Relogin(Credentials),
    Pong,
    Disconnect { reason: Option<String> },
    Chat {
        message: String,
        /// `None` for a public message.
        recipient: Option<String>,
    },
    Motd(String),
    Announcement(String),
    Clients,
    Games,
    GameOpen { name: String, max_players: u32 },
    GameConnect { name: String },
    GameStart,
    GameDisconnect,
}

impl Command {
    pub const LOGIN: &'static str = "LOGIN";
    pub const RELOGIN: &'static str = "RELOGIN";
    pub const PONG: &'static str = "PONG";
    pub const DISCONNECT: &'static str = "DISCONNECT";
    pub const CHAT: &'static str = "CHAT";
    pub const MOTD: &'static str = "MOTD";
    pub const ANNOUNCEMENT: &'static str = "ANNOUNCEMENT";
    pub const CLIENTS: &'static str = "CLIENTS";
    pub const GAMES: &'static str = "GAMES";
    pub const GAME_OPEN: &'static str = "GAME_OPEN";
    pub const GAME_CONNECT: &'static str = "GAME_CONNECT";
    pub const GAME_START: &'static str = "GAME_START";
    pub const GAME_DISCONNECT: &'static str = "GAME_DISCONNECT";

    /// Parses the fields of one frame.
    ///
    /// Fields are decoded as UTF-8 with lossy replacement. Surplus trailing
    /// arguments are ignored.
    ///
    /// # Errors
    /// An unknown command name yields `GARBAGE_RECEIVED / INVALID_CMD`; a
    /// bad or missing argument yields an error scoped to the command.
    pub fn parse(fields: &[Vec<u8>]) -> Result<Self, CommandError> {
        let Some((head, rest)) = fields.split_first() else {
            return Err(CommandError::invalid_command());
        };

        let args = |scope| Args::new(scope, rest);

        let command = match head.as_slice() {
            b"LOGIN" => Self::Login(args(Self::LOGIN).credentials()?),
            b"RELOGIN" => Self::Relogin(args(Self::RELOGIN).credentials()?),
            b"PONG" => Self::Pong,
            b"DISCONNECT" => Self::Disconnect {
                reason: args(Self::DISCONNECT).optional(),
            },
            b"CHAT" => {
                let mut args = args(Self::CHAT);
                let message = args.string("message")?;
                let recipient = args.optional();
                Self::Chat { message, recipient }
            }
            b"MOTD" => Self::Motd(args(Self::MOTD).string("text")?),
            b"ANNOUNCEMENT" => Self::Announcement(args(Self::ANNOUNCEMENT).string("text")?),
            b"CLIENTS" => Self::Clients,
            b"GAMES" => Self::Games,
            b"GAME_OPEN" => {
                let mut args = args(Self::GAME_OPEN);
                let name = args.string("name")?;
                let max_players = args.positive_integer("max_players")?;
                Self::GameOpen { name, max_players }
            }
            b"GAME_CONNECT" => Self::GameConnect {
                name: args(Self::GAME_CONNECT).string("name")?,
            },
            b"GAME_START" => Self::GameStart,
            b"GAME_DISCONNECT" => Self::GameDisconnect,
            _ => return Err(CommandError::invalid_command()),
        };
        Ok(command)
    }

    /// The command word, which is also the scope of its errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => Self::LOGIN,
            Self::Relogin(_) => Self::RELOGIN,
            Self::Pong => Self::PONG,
            Self::Disconnect { .. } => Self::DISCONNECT,
            Self::Chat { .. } => Self::CHAT,
            Self::Motd(_) => Self::MOTD,
            Self::Announcement(_) => Self::ANNOUNCEMENT,
            Self::Clients => Self::CLIENTS,
            Self::Games => Self::GAMES,
            Self::GameOpen { .. } => Self::GAME_OPEN,
            Self::GameConnect { .. } => Self::GAME_CONNECT,
            Self::GameStart => Self::GAME_START,
            Self::GameDisconnect => Self::GAME_DISCONNECT,
        }
    }

    /// Whether the command may be sent before logging in.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            Self::Login(_) | Self::Relogin(_) | Self::Pong | Self::Disconnect { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Argument cursor
// ---------------------------------------------------------------------------

/// Walks a command's arguments left to right.
struct Args<'a> {
    scope: &'static str,
    fields: std::slice::Iter<'a, Vec<u8>>,
}

impl<'a> Args<'a> {
    fn new(scope: &'static str, fields: &'a [Vec<u8>]) -> Self {
        Self {
            scope,
            fields: fields.iter(),
        }
    }

    fn error(&self, reason: String) -> CommandError {
        CommandError::new(self.scope, reason)
    }

    fn string(&mut self, what: &str) -> Result<String, CommandError> {
        match self.fields.next() {
            Some(field) => Ok(String::from_utf8_lossy(field).into_owned()),
            None => Err(self.error(format!("Missing argument: {what}"))),
        }
    }

    /// The next argument, or `None` if it's absent or empty.
    fn optional(&mut self) -> Option<String> {
        self.fields
            .next()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .filter(|s| !s.is_empty())
    }

    fn integer(&mut self, what: &str) -> Result<u32, CommandError> {
        let token = self.string(what)?;
        token
            .parse()
            .map_err(|_| self.error(format!("Invalid integer: '{token}'")))
    }

    fn positive_integer(&mut self, what: &str) -> Result<u32, CommandError> {
        match self.integer(what)? {
            0 => Err(self.error("Invalid integer: '0'".to_string())),
            n => Ok(n),
        }
    }

    fn boolean(&mut self, what: &str) -> Result<bool, CommandError> {
        let token = self.string(what)?;
        match token.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(self.error(format!("Invalid bool: '{token}'"))),
        }
    }

    fn credentials(&mut self) -> Result<Credentials, CommandError> {
        let protocol_version = self.integer("protocol_version")?;
        let name = self.string("name")?;
        let build_id = self.string("build_id")?;
        let registered = self.boolean("registered")?;
        let password = if registered {
            Some(self.string("password")?)
        } else {
            None
        };
        Ok(Credentials {
            protocol_version,
            name,
            build_id,
            registered,
            password,
        })
    }
}
