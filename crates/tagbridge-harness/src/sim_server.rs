//! Run the production server inside a turmoil host.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use tagbridge_core::Registry;
use tagbridge_server::{DriverConfig, Forwarder, Server};
use tokio_util::sync::CancellationToken;

use crate::{SimEnv, SimTransport};

/// Port the simulated bridge listens on.
pub const BRIDGE_PORT: u16 = 5000;

/// Bind on [`BRIDGE_PORT`] and serve until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns the bind error if the simulated port is taken.
pub async fn run_bridge(
    registry: Arc<dyn Registry>,
    forwarder: impl Forwarder + 'static,
    config: DriverConfig,
    shutdown: CancellationToken,
) -> turmoil::Result {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, BRIDGE_PORT));
    let transport = SimTransport::bind(addr).await?;
    let server = Server::new(transport, SimEnv::new(), registry, Arc::new(forwarder), config);

    server.run(shutdown).await;
    Ok(())
}
