//! Turmoil TCP transport.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tagbridge_core::Transport;
use turmoil::net::{TcpListener, TcpStream};

/// Listening socket on turmoil's simulated network.
pub struct SimTransport {
    listener: TcpListener,
}

impl SimTransport {
    /// Bind on the current simulated host.
    ///
    /// Must be called from inside a turmoil host or client.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
