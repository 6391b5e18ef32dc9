//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples presence tracking from system resources
//! (time, randomness). This enables:
//!
//! - Deterministic Simulation: Turmoil drives a virtual clock, so a reader
//!   that stays silent for five seconds costs no wall-clock time.
//!
//! - Production Runtime: the tokio implementation uses the real system clock
//!   without any change to the session logic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async primitives.
///
/// Session code never reads the clock itself; the driver asks the
/// environment and hands the instant to the state machine.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver and test code should sleep; the session state machine
    /// never does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations MUST be seeded so a failing run can be
    /// replayed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for connection IDs.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
