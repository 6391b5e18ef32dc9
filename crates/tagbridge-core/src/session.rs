//! Presence session state machine.
//!
//! One `PresenceSession` per accepted reader connection. It owns the
//! presence table for that connection and decides when a tag transition is
//! worth reporting.
//!
//! ## States
//!
//! ```text
//!            FrameReceived
//!            ┌──────────┐
//!            ▼          │
//!   new ──► Open ───────┘
//!            │
//!            │ ConnectionClosed (sweep)
//!            ▼
//!          Closed   (terminal, every further event is rejected)
//! ```
//!
//! ## Debounce
//!
//! A tag sitting under the antenna is reported once, on first sighting.
//! Repeat sightings only refresh `last_seen`. Disappearance is decided by a
//! single sweep when the connection ends: entries unseen for longer than
//! `stale_after` are reported missing (if their appearance was reported) and
//! evicted; fresher entries are dropped silently with the table.
//!
//! There is no periodic sweep while the connection is open. A tag that
//! leaves mid-connection is reported when the reader disconnects.
//!
//! ## Sans-IO
//!
//! The session never touches the socket, the clock, or the network. The
//! driver passes `now` in every event and executes the returned actions in
//! order before feeding the next event.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt,
    time::{Duration, Instant},
};

use crate::{
    epc::{self, Epc},
    event::PresenceEvent,
    registry::ReaderIdentity,
};

/// Default staleness threshold.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5);

/// Identifier of one accepted connection, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// An entry is stale once unseen for strictly longer than this.
    pub stale_after: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { stale_after: DEFAULT_STALE_AFTER }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// Reader closed the stream (read returned EOF).
    PeerClosed,
    /// Read failed.
    ReadError(String),
    /// The bridge is shutting down.
    Shutdown,
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::ReadError(e) => write!(f, "read error: {e}"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Receiving frames.
    Open,
    /// Swept and finished.
    Closed,
}

/// Inputs to the session.
#[derive(Debug, Clone)]
pub enum SessionEvent<'a> {
    /// One read chunk arrived.
    FrameReceived {
        /// Raw bytes of the chunk.
        frame: &'a [u8],
        /// Arrival time.
        now: Instant,
    },

    /// The connection ended.
    ConnectionClosed {
        /// Why it ended.
        cause: CloseCause,
        /// Sweep time.
        now: Instant,
    },
}

/// Outputs for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Post this event to the inventory service.
    Forward(PresenceEvent),

    /// The session ended. Always the last action of a session.
    Finished {
        /// Why the connection ended.
        cause: CloseCause,
        /// Stale entries removed by the sweep.
        evicted: usize,
        /// Fresh entries dropped with the table.
        dropped: usize,
    },
}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Event delivered after the session was swept.
    #[error("session {0} is closed")]
    Closed(ConnectionId),
}

#[derive(Debug, Clone, Copy)]
struct EpcState {
    last_seen: Instant,
    /// An appeared event was attempted for this tag.
    reported: bool,
}

/// Per-connection presence tracker.
#[derive(Debug)]
pub struct PresenceSession {
    conn_id: ConnectionId,
    identity: ReaderIdentity,
    config: SessionConfig,
    /// Tags currently believed present, ordered so sweeps are deterministic.
    table: BTreeMap<Epc, EpcState>,
    state: SessionState,
}

impl PresenceSession {
    /// Start a session for an identified reader.
    pub fn new(conn_id: ConnectionId, identity: ReaderIdentity, config: SessionConfig) -> Self {
        Self { conn_id, identity, config, table: BTreeMap::new(), state: SessionState::Open }
    }

    /// Connection this session belongs to.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Reader identity snapshotted at accept time.
    pub fn identity(&self) -> &ReaderIdentity {
        &self.identity
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of tags currently tracked.
    pub fn tracked(&self) -> usize {
        self.table.len()
    }

    /// Whether a tag is currently tracked.
    pub fn is_tracked(&self, epc: &Epc) -> bool {
        self.table.contains_key(epc)
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` for any event after `ConnectionClosed`.
    pub fn handle(&mut self, event: SessionEvent<'_>) -> Result<Vec<SessionAction>, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed(self.conn_id));
        }

        match event {
            SessionEvent::FrameReceived { frame, now } => Ok(self.handle_frame(frame, now)),
            SessionEvent::ConnectionClosed { cause, now } => Ok(self.handle_close(cause, now)),
        }
    }

    fn handle_frame(&mut self, frame: &[u8], now: Instant) -> Vec<SessionAction> {
        let Some(epc) = epc::decode(frame) else {
            return Vec::new();
        };

        match self.table.entry(epc) {
            Entry::Occupied(mut seen) => {
                seen.get_mut().last_seen = now;
                Vec::new()
            },
            Entry::Vacant(slot) => {
                let state = slot.insert(EpcState { last_seen: now, reported: false });
                let event =
                    PresenceEvent::appeared(self.identity.ip, epc, self.identity.box_type);
                // Delivery is best-effort: the attempt marks the tag reported.
                state.reported = true;
                vec![SessionAction::Forward(event)]
            },
        }
    }

    fn handle_close(&mut self, cause: CloseCause, now: Instant) -> Vec<SessionAction> {
        let stale_after = self.config.stale_after;
        let ip = self.identity.ip;
        let box_type = self.identity.box_type;

        let mut actions = Vec::new();
        let mut evicted = 0;

        self.table.retain(|epc, state| {
            if now.saturating_duration_since(state.last_seen) <= stale_after {
                return true;
            }

            if state.reported {
                let event = PresenceEvent::disappeared(ip, *epc, box_type);
                actions.push(SessionAction::Forward(event));
            }
            evicted += 1;
            false
        });

        let dropped = self.table.len();
        self.table.clear();
        self.state = SessionState::Closed;

        actions.push(SessionAction::Finished { cause, evicted, dropped });
        actions
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::registry::BoxType;

    fn shelf() -> ReaderIdentity {
        ReaderIdentity {
            ip: "10.0.0.5".parse().unwrap(),
            box_type: BoxType::Shelf,
            name: "Fiction-A".to_string(),
        }
    }

    fn session() -> PresenceSession {
        PresenceSession::new(ConnectionId(1), shelf(), SessionConfig::default())
    }

    fn frame(epc: [u8; 6]) -> Vec<u8> {
        let mut buf = hex!("CCFF0011").to_vec();
        buf.extend_from_slice(&epc);
        buf.extend_from_slice(&hex!("0D0A"));
        buf
    }

    fn forwards(actions: &[SessionAction]) -> Vec<&PresenceEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Forward(e) => Some(e),
                SessionAction::Finished { .. } => None,
            })
            .collect()
    }

    const TAG: [u8; 6] = hex!("A1B2C3D4E5F6");

    #[test]
    fn first_sighting_forwards_appearance() {
        let mut session = session();
        let t0 = Instant::now();

        let actions =
            session.handle(SessionEvent::FrameReceived { frame: &frame(TAG), now: t0 }).unwrap();

        assert_eq!(
            actions,
            vec![SessionAction::Forward(PresenceEvent::appeared(
                "10.0.0.5".parse().unwrap(),
                Epc::from_bytes(TAG),
                BoxType::Shelf,
            ))]
        );
        assert!(session.is_tracked(&Epc::from_bytes(TAG)));
    }

    #[test]
    fn repeat_sighting_is_debounced() {
        let mut session = session();
        let t0 = Instant::now();
        let f = frame(TAG);

        session.handle(SessionEvent::FrameReceived { frame: &f, now: t0 }).unwrap();
        for i in 1..10 {
            let now = t0 + Duration::from_millis(200 * i);
            let actions = session.handle(SessionEvent::FrameReceived { frame: &f, now }).unwrap();
            assert!(actions.is_empty());
        }

        assert_eq!(session.tracked(), 1);
    }

    #[test]
    fn undecodable_frame_changes_nothing() {
        let mut session = session();
        let actions = session
            .handle(SessionEvent::FrameReceived { frame: &hex!("CCFF"), now: Instant::now() })
            .unwrap();

        assert!(actions.is_empty());
        assert_eq!(session.tracked(), 0);
    }

    #[test]
    fn stale_reported_tag_disappears_on_close() {
        let mut session = session();
        let t0 = Instant::now();
        session.handle(SessionEvent::FrameReceived { frame: &frame(TAG), now: t0 }).unwrap();

        let actions = session
            .handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::PeerClosed,
                now: t0 + Duration::from_secs(6),
            })
            .unwrap();

        assert_eq!(
            actions,
            vec![
                SessionAction::Forward(PresenceEvent::disappeared(
                    "10.0.0.5".parse().unwrap(),
                    Epc::from_bytes(TAG),
                    BoxType::Shelf,
                )),
                SessionAction::Finished { cause: CloseCause::PeerClosed, evicted: 1, dropped: 0 },
            ]
        );
        assert_eq!(session.tracked(), 0);
    }

    #[test]
    fn fresh_tag_is_dropped_without_event() {
        let mut session = session();
        let t0 = Instant::now();
        session.handle(SessionEvent::FrameReceived { frame: &frame(TAG), now: t0 }).unwrap();

        let actions = session
            .handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::PeerClosed,
                now: t0 + Duration::from_secs(3),
            })
            .unwrap();

        assert_eq!(
            actions,
            vec![SessionAction::Finished { cause: CloseCause::PeerClosed, evicted: 0, dropped: 1 }]
        );
        assert_eq!(session.tracked(), 0);
    }

    #[test]
    fn exactly_threshold_is_not_stale() {
        let mut session = session();
        let t0 = Instant::now();
        session.handle(SessionEvent::FrameReceived { frame: &frame(TAG), now: t0 }).unwrap();

        let actions = session
            .handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::PeerClosed,
                now: t0 + DEFAULT_STALE_AFTER,
            })
            .unwrap();

        assert!(forwards(&actions).is_empty());
    }

    #[test]
    fn repeat_sighting_refreshes_staleness() {
        let mut session = session();
        let t0 = Instant::now();
        let f = frame(TAG);

        session.handle(SessionEvent::FrameReceived { frame: &f, now: t0 }).unwrap();
        session
            .handle(SessionEvent::FrameReceived { frame: &f, now: t0 + Duration::from_secs(2) })
            .unwrap();

        // 5s after first sighting but only 3s after the last one.
        let actions = session
            .handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::PeerClosed,
                now: t0 + Duration::from_secs(5),
            })
            .unwrap();
        assert!(forwards(&actions).is_empty());
    }

    #[test]
    fn sweep_mixes_stale_and_fresh_tags() {
        let mut session = session();
        let t0 = Instant::now();
        let old = hex!("000000000001");
        let new = hex!("000000000002");

        session.handle(SessionEvent::FrameReceived { frame: &frame(old), now: t0 }).unwrap();
        session
            .handle(SessionEvent::FrameReceived {
                frame: &frame(new),
                now: t0 + Duration::from_secs(8),
            })
            .unwrap();

        let actions = session
            .handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::ReadError("connection reset".to_string()),
                now: t0 + Duration::from_secs(10),
            })
            .unwrap();

        let gone = forwards(&actions);
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].epc, Epc::from_bytes(old));
        assert!(!gone[0].detected);
        assert!(matches!(
            actions.last(),
            Some(SessionAction::Finished { evicted: 1, dropped: 1, .. })
        ));
    }

    #[test]
    fn closed_session_rejects_events() {
        let mut session = session();
        let now = Instant::now();
        session
            .handle(SessionEvent::ConnectionClosed { cause: CloseCause::Shutdown, now })
            .unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.handle(SessionEvent::FrameReceived { frame: &frame(TAG), now }),
            Err(SessionError::Closed(ConnectionId(1)))
        );
        assert_eq!(
            session.handle(SessionEvent::ConnectionClosed { cause: CloseCause::Shutdown, now }),
            Err(SessionError::Closed(ConnectionId(1)))
        );
    }

    #[test]
    fn close_cause_display() {
        assert_eq!(CloseCause::PeerClosed.to_string(), "peer closed");
        assert_eq!(CloseCause::ReadError("reset".to_string()).to_string(), "read error: reset");
        assert_eq!(ConnectionId(0xab).to_string(), "00000000000000ab");
    }

    proptest! {
        #[test]
        fn each_tag_appears_at_most_once(
            sightings in proptest::collection::vec((0u8..4, 0u64..20_000), 0..64),
            close_at in 0u64..30_000,
        ) {
            let mut session = session();
            let t0 = Instant::now();
            let mut appeared = BTreeMap::<u8, usize>::new();
            let mut elapsed = 0;

            for (tag, step) in sightings {
                elapsed += step;
                let now = t0 + Duration::from_millis(elapsed);
                let buf = frame([0, 0, 0, 0, 0, tag]);
                let actions =
                    session.handle(SessionEvent::FrameReceived { frame: &buf, now }).unwrap();
                for event in forwards(&actions) {
                    prop_assert!(event.detected);
                    *appeared.entry(tag).or_default() += 1;
                }
            }

            prop_assert!(appeared.values().all(|&n| n == 1));
            prop_assert_eq!(session.tracked(), appeared.len());

            let now = t0 + Duration::from_millis(elapsed + close_at);
            let actions = session
                .handle(SessionEvent::ConnectionClosed { cause: CloseCause::PeerClosed, now })
                .unwrap();

            prop_assert!(forwards(&actions).iter().all(|e| !e.detected));
            prop_assert!(forwards(&actions).len() <= appeared.len());
            prop_assert_eq!(session.tracked(), 0);
        }
    }
}
