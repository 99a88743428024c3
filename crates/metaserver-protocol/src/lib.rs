//! Wire protocol for the metaserver.
//!
//! This crate defines the "language" lobby clients and the server speak:
//!
//! - **Codec** ([`FrameDecoder`], [`encode_frame`]): the length-prefixed,
//!   NUL-delimited framing that turns a byte stream into lists of fields.
//! - **Commands** ([`Command`], [`Credentials`]): what clients may ask for,
//!   parsed from fields into a closed enum.
//! - **Messages** ([`ServerMessage`] and its roster rows): everything the
//!   server may say back.
//! - **Errors** ([`ProtocolError`], [`CommandError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the engine
//! (sessions and games). It doesn't know about connections or timers; it
//! only knows how bytes map to commands and messages to bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Command) → Engine → Protocol (ServerMessage) → bytes
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod command;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{FrameDecoder, HEADER_LEN, MAX_BODY_LEN, encode_frame};
pub use command::{Command, Credentials};
pub use error::{CommandError, ProtocolError};
pub use types::{ChatKind, ClientEntry, GameEntry, Permission, ServerMessage};

// Re-exported so the layers above don't need a direct transport dependency
// just to name a connection.
pub use metaserver_transport::ConnectionId;

/// The bytes a hosted game server must echo back to prove it's reachable.
///
/// This is the game's own network protocol, not lobby framing: a 2-byte
/// length that counts itself, followed by the ping command byte.
pub const LIVENESS_PROBE: [u8; 3] = [0x00, 0x03, 0x40];
