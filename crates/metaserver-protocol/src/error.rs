//! Error types for the protocol layer.
//!
//! Framing problems and command problems are kept apart: a
//! [`ProtocolError`] means the bytes could not be turned into (or made
//! from) a frame at all, while a [`CommandError`] means the frame was fine
//! but its fields don't form a valid command.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The encoded body would not fit the 2-byte length prefix.
    #[error("frame body of {0} bytes exceeds the 65535 byte limit")]
    FrameTooLarge(usize),

    /// A field contains the terminator byte and can't be framed.
    #[error("field {0} contains a NUL byte")]
    NulInField(usize),

    /// A complete frame arrived with a zero-length body.
    #[error("empty frame")]
    EmptyFrame,

    /// A complete frame arrived whose body does not end in a terminator.
    #[error("frame body is not NUL-terminated")]
    MissingTerminator,

    /// A permission name that is not one of the three known levels.
    #[error("unknown permission: {0:?}")]
    UnknownPermission(String),
}

/// A frame that doesn't form a valid command.
///
/// `scope` and `reason` go straight onto the wire as
/// `ERROR <scope> <reason>`. The scope is the command name when we got far
/// enough to know it, `GARBAGE_RECEIVED` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{scope}: {reason}")]
pub struct CommandError {
    pub scope: &'static str,
    pub reason: String,
}

impl CommandError {
    /// Scope for frames we can't attribute to any command.
    pub const GARBAGE_RECEIVED: &'static str = "GARBAGE_RECEIVED";

    /// Reason paired with [`GARBAGE_RECEIVED`](Self::GARBAGE_RECEIVED).
    pub const INVALID_CMD: &'static str = "INVALID_CMD";

    pub fn new(scope: &'static str, reason: impl Into<String>) -> Self {
        Self {
            scope,
            reason: reason.into(),
        }
    }

    /// `GARBAGE_RECEIVED / INVALID_CMD`, the catch-all answer.
    pub fn invalid_command() -> Self {
        Self::new(Self::GARBAGE_RECEIVED, Self::INVALID_CMD)
    }
}
