//! tagbridge production server.
//!
//! Accepts reader connections over TCP, tracks tag presence per connection,
//! and posts appear/disappear events to the inventory service.
//!
//! ## Architecture
//!
//! ```text
//! tagbridge-server
//!   ├─ Server          (accept loop, one task per connection)
//!   ├─ driver          (socket ↔ PresenceSession, executes actions)
//!   ├─ HttpForwarder   (best-effort JSON POST)
//!   ├─ FileRegistry    (registry document, reloaded on change)
//!   ├─ TcpTransport    (tokio TCP listener)
//!   └─ SystemEnv       (production Environment impl)
//! ```
//!
//! The server is generic over `Transport` and `Environment`, so the harness
//! crate runs the exact same accept loop and driver on turmoil's simulated
//! network and clock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod error;
mod forwarder;
mod registry_file;
mod system_env;
mod transport;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use config::{
    DEFAULT_BIND_ADDRESS, DEFAULT_ENDPOINT, DEFAULT_FORWARD_TIMEOUT, DEFAULT_REGISTRY_PATH,
    ServerRuntimeConfig, load_registry,
};
pub use driver::{DEFAULT_READ_BUFFER, DriverConfig};
pub use error::ServerError;
pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use registry_file::FileRegistry;
pub use reqwest::StatusCode;
pub use system_env::SystemEnv;
use tagbridge_core::{Environment, Registry, Transport};
pub use transport::TcpTransport;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::driver::ConnectionContext;

/// Pause after a failed accept so a persistent failure (e.g. descriptor
/// exhaustion) doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Reader bridge server.
///
/// Wraps the connection driver with a listening transport, the reader
/// registry and the event forwarder.
pub struct Server<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Listening socket
    transport: T,
    /// Shared by every connection task
    ctx: Arc<ConnectionContext<E>>,
}

impl Server<TcpTransport, SystemEnv> {
    /// Create and bind the production server.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The registry document is malformed
    /// - The HTTP client cannot be built
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let registry = FileRegistry::open(config.registry_path)?;
        tracing::info!(path = %registry.path().display(), "following registry document");
        let forwarder = HttpForwarder::new(config.endpoint, config.forward_timeout)?;
        let transport = TcpTransport::bind(&config.bind_address).await?;

        Ok(Self::new(
            transport,
            SystemEnv::new(),
            Arc::new(registry),
            Arc::new(forwarder),
            config.driver,
        ))
    }
}

impl<T, E> Server<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Assemble a server from already-built parts.
    pub fn new(
        transport: T,
        env: E,
        registry: Arc<dyn Registry>,
        forwarder: Arc<dyn Forwarder>,
        config: DriverConfig,
    ) -> Self {
        Self { transport, ctx: Arc::new(ConnectionContext { env, registry, forwarder, config }) }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Each connection runs in its own task. On shutdown the listening
    /// socket is closed first, then every live session is told to stop,
    /// sweeps its presence table and forwards its disappearances. Returns
    /// once all sessions have drained.
    pub async fn run(self, shutdown: CancellationToken) {
        let Self { transport, ctx } = self;
        let sessions = TaskTracker::new();

        match transport.local_addr() {
            Ok(addr) => tracing::info!("Server listening on {}", addr),
            Err(e) => tracing::warn!("Server listening on unknown address: {}", e),
        }

        loop {
            let accepted = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = transport.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let ctx = Arc::clone(&ctx);
                    let shutdown = shutdown.clone();

                    sessions.spawn(driver::handle_connection(stream, peer, ctx, shutdown));
                },
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = ctx.env.sleep(ACCEPT_BACKOFF) => {},
                    }
                },
            }
        }

        drop(transport);
        sessions.close();
        tracing::info!(sessions = sessions.len(), "listener closed, draining sessions");

        sessions.wait().await;
        tracing::info!("all sessions drained");
    }
}
