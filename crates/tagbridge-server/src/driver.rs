//! Per-connection driver.
//!
//! Owns the socket of one reader connection and feeds its
//! `PresenceSession`. The driver is the only place that does I/O on behalf
//! of a session: it reads chunks, stamps them with the environment's clock,
//! and executes the returned actions before reading again.
//!
//! ## Lifecycle
//!
//! 1. Canonicalize the peer address and look it up in the registry. Unknown
//!    readers are dropped before any state exists.
//! 2. Read loop: each chunk is one `FrameReceived` event.
//! 3. EOF, read error, or shutdown ends the loop with a `CloseCause`; the
//!    session sweeps and the driver forwards any disappearances. On shutdown
//!    one more read is taken if data is already waiting, without blocking.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::BytesMut;
use tagbridge_core::{
    CloseCause, ConnectionId, Environment, PresenceSession, Registry, SessionAction,
    SessionConfig, SessionEvent,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::forwarder::Forwarder;

/// Default bytes requested per read; one read is one frame.
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Session tuning (staleness threshold)
    pub session: SessionConfig,
    /// Read buffer size in bytes
    pub read_buffer: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { session: SessionConfig::default(), read_buffer: DEFAULT_READ_BUFFER }
    }
}

/// Everything a connection task needs, shared by all connections.
pub(crate) struct ConnectionContext<E: Environment> {
    pub(crate) env: E,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) forwarder: Arc<dyn Forwarder>,
    pub(crate) config: DriverConfig,
}

/// Run one reader connection to completion.
pub(crate) async fn handle_connection<S, E>(
    mut stream: S,
    peer: SocketAddr,
    ctx: Arc<ConnectionContext<E>>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + Unpin + Send,
    E: Environment,
{
    let ip = peer.ip().to_canonical();
    let Some(identity) = ctx.registry.lookup(ip) else {
        tracing::info!(peer = %peer, "unknown reader, closing connection");
        return;
    };

    let conn_id = ConnectionId(ctx.env.random_u64());
    tracing::info!(
        conn_id = %conn_id,
        peer = %peer,
        reader = %identity.name,
        box_type = %identity.box_type,
        "reader connected"
    );

    let mut session = PresenceSession::new(conn_id, identity, ctx.config.session);
    let mut buf = BytesMut::zeroed(ctx.config.read_buffer.max(1));

    let cause = loop {
        let (read, draining) = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                // A frame already buffered still counts as a sighting.
                match tokio::time::timeout(Duration::ZERO, stream.read(&mut buf[..])).await {
                    Ok(read) => (read, true),
                    Err(_) => break CloseCause::Shutdown,
                }
            },
            read = stream.read(&mut buf[..]) => (read, false),
        };

        match read {
            Ok(0) => break CloseCause::PeerClosed,
            Ok(n) => {
                let event = SessionEvent::FrameReceived { frame: &buf[..n], now: ctx.env.now() };
                dispatch(&mut session, event, ctx.forwarder.as_ref()).await;

                if draining {
                    break CloseCause::Shutdown;
                }
            },
            Err(e) => break CloseCause::ReadError(e.to_string()),
        }
    };

    let event = SessionEvent::ConnectionClosed { cause, now: ctx.env.now() };
    dispatch(&mut session, event, ctx.forwarder.as_ref()).await;
}

/// Feed one event to the session and execute what it asks for.
async fn dispatch(
    session: &mut PresenceSession,
    event: SessionEvent<'_>,
    forwarder: &dyn Forwarder,
) {
    match session.handle(event) {
        Ok(actions) => execute_actions(session, actions, forwarder).await,
        Err(e) => tracing::error!(conn_id = %session.conn_id(), "session error: {}", e),
    }
}

/// Execute session actions in order.
async fn execute_actions(
    session: &PresenceSession,
    actions: Vec<SessionAction>,
    forwarder: &dyn Forwarder,
) {
    let conn_id = session.conn_id();
    let reader = &session.identity().name;

    for action in actions {
        match action {
            SessionAction::Forward(event) => {
                if event.detected {
                    tracing::info!(
                        conn_id = %conn_id,
                        epc = %event.epc,
                        reader_ip = %event.reader_ip,
                        "EPC detected by {} reader {}", event.box_type, reader
                    );
                } else {
                    tracing::info!(
                        conn_id = %conn_id,
                        epc = %event.epc,
                        reader_ip = %event.reader_ip,
                        "EPC no longer detected by {} reader {}", event.box_type, reader
                    );
                }

                match forwarder.forward(&event).await {
                    Ok(status) => tracing::debug!(
                        conn_id = %conn_id,
                        epc = %event.epc,
                        detected = event.detected,
                        status = %status,
                        "event forwarded"
                    ),
                    Err(e) => tracing::warn!(
                        conn_id = %conn_id,
                        epc = %event.epc,
                        detected = event.detected,
                        "failed to forward event: {}", e
                    ),
                }
            },

            SessionAction::Finished { cause, evicted, dropped } => match cause {
                CloseCause::ReadError(ref e) => tracing::warn!(
                    conn_id = %conn_id,
                    evicted,
                    dropped,
                    "reader {} disconnected after read error: {}", reader, e
                ),
                CloseCause::PeerClosed | CloseCause::Shutdown => tracing::info!(
                    conn_id = %conn_id,
                    evicted,
                    dropped,
                    "reader {} disconnected ({})", reader, cause
                ),
            },
        }
    }
}
