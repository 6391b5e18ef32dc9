//! Sans-IO presence tracking for RFID readers.
//!
//! Everything in this crate is deterministic: no sockets, no clock reads, no
//! HTTP. The server crate drives it with real I/O and the harness crate with
//! turmoil's simulated network.
//!
//! ## Architecture
//!
//! ```text
//! tagbridge-core
//!   ├─ epc          (frame → EPC decoder)
//!   ├─ registry     (IP → reader identity)
//!   ├─ session      (per-connection presence state machine)
//!   ├─ event        (wire payload for the inventory service)
//!   ├─ env          (time / randomness abstraction)
//!   └─ transport    (listening socket abstraction)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod epc;
pub mod event;
pub mod registry;
pub mod session;
pub mod transport;

pub use env::Environment;
pub use epc::{Epc, EpcParseError, decode};
pub use event::PresenceEvent;
pub use registry::{
    BoxEntry, BoxType, ReaderIdentity, Registry, RegistryConfig, RegistryError, StaticRegistry,
};
pub use session::{
    CloseCause, ConnectionId, DEFAULT_STALE_AFTER, PresenceSession, SessionAction, SessionConfig,
    SessionError, SessionEvent, SessionState,
};
pub use transport::Transport;
