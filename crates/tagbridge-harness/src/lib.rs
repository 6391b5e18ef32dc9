//! Deterministic simulation harness for the tagbridge reader bridge.
//!
//! Turmoil-based implementations of the `Environment` and `Transport` traits
//! let the production `Server` run unchanged on a simulated network with a
//! virtual clock. A reader that stays silent for minutes costs no wall-clock
//! time, and every run with the same seed is identical.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagbridge_harness::{BRIDGE_PORT, RecordingForwarder, run_bridge};
//!
//! let forwarder = RecordingForwarder::new();
//! let mut sim = turmoil::Builder::new().build();
//!
//! let recorded = forwarder.clone();
//! sim.host("bridge", move || {
//!     let forwarder = recorded.clone();
//!     async move { run_bridge(registry(), forwarder, Default::default(), token()).await }
//! });
//!
//! sim.client("reader", async {
//!     let mut stream = turmoil::net::TcpStream::connect(("bridge", BRIDGE_PORT)).await?;
//!     // write frames...
//!     Ok(())
//! });
//!
//! sim.run().unwrap();
//! assert_eq!(forwarder.events().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod recorder;
mod sim_env;
mod sim_server;
mod sim_transport;

pub use recorder::RecordingForwarder;
pub use sim_env::SimEnv;
pub use sim_server::{BRIDGE_PORT, run_bridge};
pub use sim_transport::SimTransport;
