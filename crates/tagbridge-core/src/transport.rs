//! Listening transport abstraction.
//!
//! The listener only needs two things from the network: accept a byte stream
//! together with the peer address, and report where it is bound. Production
//! uses tokio TCP, simulation uses turmoil's virtual network.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// A bound listening socket that yields reader connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Byte stream of a single accepted connection.
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Waits for the next inbound connection.
    ///
    /// Errors are per-accept; the transport stays usable afterwards.
    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;

    /// Address the transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
