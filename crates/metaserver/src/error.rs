//! Unified error type for the metaserver.

use metaserver_session::CredentialsError;
use metaserver_transport::TransportError;

use crate::config::ConfigError;

/// Anything that can stop the server from starting or running.
///
/// Client mistakes never end up here; those are answered on the wire.
/// Each layer's error converts in with `?`.
#[derive(Debug, thiserror::Error)]
pub enum MetaserverError {
    /// A transport-level error (bind, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A credential file couldn't be loaded.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
