//! Game liveness prober: the IO half of a probe.
//!
//! The engine decides when to probe and how long to wait; this module
//! only dials the host, sends the probe bytes and checks the echo.

use std::net::SocketAddr;
use std::time::Duration;

use metaserver_protocol::LIVENESS_PROBE;
use metaserver_transport::{Connection, TransportError, connect};

/// Checks whether a game server answers at `addr`.
///
/// Returns `true` only if the host echoes [`LIVENESS_PROBE`] exactly.
/// Connect failures, read failures, EOF, a wrong reply or running past
/// `io_timeout` all count as dead.
pub async fn probe(addr: SocketAddr, io_timeout: Duration) -> bool {
    match tokio::time::timeout(io_timeout, exchange(addr)).await {
        Ok(Ok(alive)) => alive,
        Ok(Err(e)) => {
            tracing::debug!(%addr, error = %e, "probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(%addr, "probe gave up waiting");
            false
        }
    }
}

async fn exchange(addr: SocketAddr) -> Result<bool, TransportError> {
    let conn = connect(addr).await?;
    conn.send(&LIVENESS_PROBE).await?;

    let mut reply = Vec::with_capacity(LIVENESS_PROBE.len());
    while reply.len() < LIVENESS_PROBE.len() {
        match conn.recv().await? {
            Some(chunk) => reply.extend_from_slice(&chunk),
            None => return Ok(false),
        }
    }
    // Best effort; the answer is already in.
    if let Err(e) = conn.close().await {
        tracing::debug!(%addr, error = %e, "closing probe connection failed");
    }
    Ok(reply.get(..LIVENESS_PROBE.len()) == Some(&LIVENESS_PROBE[..]))
}
