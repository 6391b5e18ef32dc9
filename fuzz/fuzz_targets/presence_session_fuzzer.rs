//! Fuzz target for [`PresenceSession`] state machine
//!
//! # Strategy
//!
//! - Event sequences: arbitrary frames interleaved with clock advances and
//!   a close at an arbitrary point
//! - Tag reuse: a small EPC alphabet so the same tag recurs often
//!
//! # Invariants
//!
//! - Each tag produces at most one appearance per session
//! - Disappearances only follow an appearance of the same tag
//! - Disappearances only for tags unseen longer than the threshold
//! - `Finished` is the last action and `Closed` is terminal
//! - NEVER panic on arbitrary frames

#![no_main]

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tagbridge_core::{
    decode, BoxType, CloseCause, ConnectionId, Epc, PresenceSession, ReaderIdentity,
    SessionAction, SessionConfig, SessionError, SessionEvent, SessionState,
};

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    /// Well-formed frame carrying one of a few tags.
    Tag { tag: u8, trailer: u8 },
    /// Raw bytes, usually malformed.
    Raw(Vec<u8>),
    Advance { millis: u16 },
    Close,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    stale_after_secs: u8,
    events: Vec<FuzzEvent>,
}

fn tag_frame(tag: u8, trailer: u8) -> Vec<u8> {
    let mut frame = vec![0xCC, 0xFF, 0x00, 0x11, 0, 0, 0, 0, 0, tag % 4];
    frame.extend(std::iter::repeat(trailer).take(usize::from(trailer % 3)));
    frame
}

fuzz_target!(|input: FuzzInput| {
    let stale_after = Duration::from_secs(u64::from(input.stale_after_secs % 10));
    let identity = ReaderIdentity {
        ip: "10.0.0.5".parse().expect("literal address"),
        box_type: BoxType::Shelf,
        name: "fuzz".to_string(),
    };
    let config = SessionConfig { stale_after };
    let mut session = PresenceSession::new(ConnectionId(1), identity, config);

    let mut now = Instant::now();
    let mut last_seen: HashMap<Epc, Instant> = HashMap::new();
    let mut appeared: HashSet<Epc> = HashSet::new();
    let mut finished = false;

    for event in input.events {
        let result = match event {
            FuzzEvent::Tag { tag, trailer } => {
                let frame = tag_frame(tag, trailer);
                let seen = decode(&frame);
                let result = session.handle(SessionEvent::FrameReceived { frame: &frame, now });
                if let (Some(epc), false) = (seen, finished) {
                    last_seen.insert(epc, now);
                }
                result
            },
            FuzzEvent::Raw(bytes) => {
                let seen = decode(&bytes);
                let result = session.handle(SessionEvent::FrameReceived { frame: &bytes, now });
                if let (Some(epc), false) = (seen, finished) {
                    last_seen.insert(epc, now);
                }
                result
            },
            FuzzEvent::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                continue;
            },
            FuzzEvent::Close => session.handle(SessionEvent::ConnectionClosed {
                cause: CloseCause::PeerClosed,
                now,
            }),
        };

        let actions = match result {
            Ok(actions) => actions,
            Err(SessionError::Closed(id)) => {
                assert!(finished, "rejected event on open session");
                assert_eq!(id, ConnectionId(1));
                assert_eq!(session.state(), SessionState::Closed);
                continue;
            },
        };
        assert!(!finished, "closed session produced {actions:?}");

        let count = actions.len();
        for (i, action) in actions.into_iter().enumerate() {
            match action {
                SessionAction::Forward(event) if event.detected => {
                    assert!(appeared.insert(event.epc), "{} appeared twice", event.epc);
                },
                SessionAction::Forward(event) => {
                    assert!(appeared.contains(&event.epc), "{} vanished unseen", event.epc);
                    let seen = last_seen[&event.epc];
                    assert!(now.saturating_duration_since(seen) > stale_after);
                },
                SessionAction::Finished { .. } => {
                    assert_eq!(i + 1, count, "Finished must be the last action");
                    finished = true;
                },
            }
        }

        if finished {
            assert_eq!(session.state(), SessionState::Closed);
            assert_eq!(session.tracked(), 0);
        }
    }
});
