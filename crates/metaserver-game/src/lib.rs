//! Hosted game listings for the metaserver.
//!
//! The lobby never runs games. A client hosts one on its own machine and
//! advertises it here; others look it up and connect to the host directly.
//! This crate keeps the list of advertised games and who is in which.
//!
//! # Key types
//!
//! - [`GameRegistry`]: opens, joins, leaves, starts and removes games
//! - [`Game`]: one listing and its members
//! - [`GameId`]: stable handle for timers and probes, since a name can be
//!   reused after a game is gone
//! - [`Departure`]: what happened when a member left

mod error;
mod game;
mod registry;

pub use error::GameError;
pub use game::{Game, GameId};
pub use registry::{Departure, GameRegistry};
