//! Runtime configuration and registry loading.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use tagbridge_core::{RegistryConfig, StaticRegistry};

use crate::{driver::DriverConfig, error::ServerError};

/// Default listen address (all interfaces, port 5000).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Default registry document, written by the admin tool.
pub const DEFAULT_REGISTRY_PATH: &str = "rfid_config.json";

/// Default inventory service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://rfid-library.onrender.com/api/rfid-update";

/// Default HTTP request timeout for a single forward.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:5000")
    pub bind_address: String,
    /// Path of the registry JSON document
    pub registry_path: PathBuf,
    /// URL events are posted to
    pub endpoint: String,
    /// Request timeout for each forward
    pub forward_timeout: Duration,
    /// Driver configuration (staleness, read size)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            driver: DriverConfig::default(),
        }
    }
}

/// Load the reader registry from its JSON document.
///
/// A missing file yields an empty registry. The server wraps this in a
/// `FileRegistry`, so readers are accepted once the admin tool writes the
/// document.
///
/// # Errors
///
/// Returns `ServerError::Config` if the file cannot be read or parsed, and
/// `ServerError::Registry` if an entry has an invalid IP.
pub fn load_registry(path: &Path) -> Result<StaticRegistry, ServerError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "registry not found, no readers registered");
            return Ok(StaticRegistry::new());
        },
        Err(e) => {
            return Err(ServerError::Config(format!("cannot read {}: {}", path.display(), e)));
        },
    };

    let document: RegistryConfig = serde_json::from_str(&text)
        .map_err(|e| ServerError::Config(format!("cannot parse {}: {}", path.display(), e)))?;

    let registry = StaticRegistry::from_config(&document)?;
    tracing::info!(
        path = %path.display(),
        shelves = document.shelves.len(),
        return_boxes = document.return_boxes.len(),
        "registry loaded"
    );

    Ok(registry)
}
