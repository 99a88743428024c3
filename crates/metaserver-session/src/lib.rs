//! Client identity for the metaserver.
//!
//! This crate answers three questions about a lobby client:
//!
//! 1. **Who may log in, and as what?** The [`CredentialStore`] capability
//!    and the permission policy ([`authorize`], [`check_relogin`],
//!    [`permits`]).
//! 2. **Who is logged in right now?** The [`ClientRegistry`], which keeps
//!    display names unique and remembers login order.
//! 3. **What does each of them look like?** The [`Client`] record.
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)  ← decides what happens on LOGIN, RELOGIN, disconnect
//!     ↕
//! Session Layer (this crate)  ← names, passwords, permissions
//!     ↕
//! Protocol Layer (below)  ← Credentials, Permission, ConnectionId
//! ```

mod client;
mod credentials;
mod error;
mod policy;
mod registry;

pub use client::Client;
pub use credentials::{CredentialStore, MemoryCredentials};
pub use error::{CredentialsError, SessionError};
pub use policy::{Privilege, authorize, check_relogin, permits};
pub use registry::ClientRegistry;
