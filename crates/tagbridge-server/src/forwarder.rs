//! Event forwarding to the inventory service.
//!
//! Delivery is best-effort: one POST per event, no retry, no queue. The
//! caller logs the outcome and moves on; presence state never depends on it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tagbridge_core::PresenceEvent;

/// Upper bound on TCP/TLS connect time to the endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from a single forward attempt.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// HTTP client could not be built (TLS backend initialisation).
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Endpoint unreachable, timed out, or the connection broke.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned {0}")]
    Status(StatusCode),
}

/// Sink for presence events.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Any failure is returned to the caller; implementations never retry.
    async fn forward(&self, event: &PresenceEvent) -> Result<StatusCode, ForwardError>;
}

/// Posts events as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpForwarder {
    /// Create a forwarder with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Client` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self { endpoint: endpoint.into(), http })
    }

    /// Target URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, event: &PresenceEvent) -> Result<StatusCode, ForwardError> {
        // `json` sets `Content-Type: application/json`.
        let response = self.http.post(&self.endpoint).json(event).send().await?;
        let status = response.status();

        if status.is_success() { Ok(status) } else { Err(ForwardError::Status(status)) }
    }
}
