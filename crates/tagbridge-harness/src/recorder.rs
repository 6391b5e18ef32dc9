//! Forwarder that records instead of posting.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tagbridge_core::PresenceEvent;
use tagbridge_server::{ForwardError, Forwarder, StatusCode};

/// Captures every forward attempt in order.
///
/// Clones share the same log, so one clone can be moved into a simulated
/// host while the test keeps another for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingForwarder {
    events: Arc<Mutex<Vec<PresenceEvent>>>,
    /// Status returned for every attempt; `None` means success.
    failure: Option<StatusCode>,
}

impl RecordingForwarder {
    /// Forwarder that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwarder that records, then reports `status` as a failure.
    pub fn failing(status: StatusCode) -> Self {
        Self { events: Arc::default(), failure: Some(status) }
    }

    /// Snapshot of all attempts so far.
    pub fn events(&self) -> Vec<PresenceEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, event: &PresenceEvent) -> Result<StatusCode, ForwardError> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());

        match self.failure {
            Some(status) => Err(ForwardError::Status(status)),
            None => Ok(StatusCode::OK),
        }
    }
}
