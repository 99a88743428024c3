//! Error types for the session layer.

use std::path::PathBuf;

use metaserver_protocol::ConnectionId;

/// Why a login, relogin or privileged command was refused.
///
/// Each variant maps to the reason string the client sees in
/// `ERROR <command> <reason>`; use [`reason`](Self::reason) for that rather
/// than the `Display` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The client speaks a protocol version we don't.
    #[error("unsupported protocol version {0}")]
    UnsupportedProtocol(u32),

    /// Registered login with an unknown user or a bad password.
    #[error("wrong password for {0}")]
    WrongPassword(String),

    /// The name is already held by a logged-in client, or this
    /// connection is logged in already.
    #[error("{0} is already logged in")]
    AlreadyLoggedIn(String),

    /// Relogin for a name nobody holds.
    #[error("{0} is not logged in")]
    NotLoggedIn(String),

    /// This connection is already waiting on a relogin for another
    /// connection.
    #[error("relogin already pending against {0}")]
    ReloginPending(ConnectionId),

    /// Relogin credentials differ from the existing session's.
    #[error("relogin information for {0} does not match")]
    WrongInformation(String),

    /// The requested display name can't be used.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The client's permission level doesn't allow this.
    #[error("deficient permission")]
    DeficientPermission,
}

impl SessionError {
    /// The wire reason for this error.
    pub fn reason(&self) -> String {
        match self {
            Self::UnsupportedProtocol(_) => "UNSUPPORTED_PROTOCOL".into(),
            Self::WrongPassword(_) => "WRONG_PASSWORD".into(),
            Self::AlreadyLoggedIn(_) => "ALREADY_LOGGED_IN".into(),
            Self::NotLoggedIn(_) => "NOT_LOGGED_IN".into(),
            Self::WrongInformation(_) => "WRONG_INFORMATION".into(),
            Self::ReloginPending(_) => "RELOGIN_PENDING".into(),
            Self::InvalidName(name) => format!("Invalid name: '{name}'"),
            Self::DeficientPermission => "DEFICIENT_PERMISSION".into(),
        }
    }
}

/// Errors while loading a credential file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("failed to read credentials from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A flat-file line that isn't `name<TAB>password<TAB>PERMISSION`.
    #[error("credentials line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid credentials JSON")]
    Json(#[from] serde_json::Error),
}
