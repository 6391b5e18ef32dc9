//! Production `Environment`: wall clock, tokio timers, OS randomness.

use std::time::{Duration, Instant};

use tagbridge_core::Environment;

/// Production environment backed by the system clock.
///
/// Connection IDs come from `getrandom`; they only correlate log lines, but
/// OS entropy keeps them unique across restarts without any state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            // IDs only label log lines; a zeroed one is still usable.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        }
    }
}
