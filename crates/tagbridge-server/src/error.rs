//! Server error types.

use std::fmt;

use tagbridge_core::RegistryError;

use crate::forwarder::ForwardError;

/// Errors that prevent the bridge from starting.
///
/// Everything that goes wrong on a single connection is handled inside that
/// connection's task and never surfaces here.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unreadable or malformed registry document)
    Config(String),

    /// Listening socket could not be bound
    Bind {
        /// Requested address
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Registry document contains an invalid entry
    Registry(RegistryError),

    /// HTTP forwarder could not be constructed
    Forwarder(ForwardError),

    /// Transport/network error
    Transport(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Bind { address, source } => write!(f, "failed to bind {}: {}", address, source),
            Self::Registry(err) => write!(f, "registry error: {}", err),
            Self::Forwarder(err) => write!(f, "forwarder error: {}", err),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Registry(err) => Some(err),
            Self::Forwarder(err) => Some(err),
            Self::Config(_) | Self::Transport(_) => None,
        }
    }
}

impl From<RegistryError> for ServerError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<ForwardError> for ServerError {
    fn from(err: ForwardError) -> Self {
        Self::Forwarder(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
