//! TCP transport for reader connections.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tagbridge_core::Transport;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;

/// Plain TCP listener. Readers push frames with no framing or handshake.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address is invalid or in use.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address: address.to_string(), source })?;

        Ok(Self { listener })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
