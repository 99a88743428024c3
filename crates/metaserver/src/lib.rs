//! # Metaserver
//!
//! A multiplayer game lobby. Clients log in, chat, advertise the games
//! they host and find games to join; the lobby checks that advertised
//! games are actually reachable and drops clients that go silent. No
//! gameplay traffic passes through it.
//!
//! The lobby rules live in [`MetaServer`], a sans-IO engine driven by a
//! [`Clock`](metaserver_timer::Clock). [`Server`] wraps it in a tokio
//! event loop over raw TCP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metaserver::prelude::*;
//!
//! # async fn start() -> Result<(), MetaserverError> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:7395")
//!     .build(MemoryCredentials::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod engine;
mod error;
mod handler;
pub mod logging;
pub mod prober;
mod server;

pub use engine::{Effect, MetaServer};
pub use error::MetaserverError;
pub use server::{Server, ServerBuilder};

/// Commonly used types for running or embedding the lobby.
pub mod prelude {
    pub use crate::config::{LogConfig, ServerConfig};
    pub use crate::{Effect, MetaServer, MetaserverError, Server, ServerBuilder};
    pub use metaserver_game::{Game, GameId};
    pub use metaserver_protocol::{
        ConnectionId, FrameDecoder, Permission, ServerMessage, encode_frame,
    };
    pub use metaserver_session::{Client, CredentialStore, MemoryCredentials};
    pub use metaserver_timer::{Clock, ManualClock, TokioClock};
}
