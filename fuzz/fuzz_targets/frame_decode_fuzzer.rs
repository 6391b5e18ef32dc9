//! Fuzz target for reader frame decoding
//!
//! # Invariants
//!
//! - Frames shorter than 10 bytes decode to nothing
//! - Longer frames always decode, to exactly bytes 4..10
//! - Rendered EPCs are 12 upper-case hex digits and parse back unchanged
//! - NEVER panic on arbitrary input

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagbridge_core::{decode, Epc};

fuzz_target!(|frame: &[u8]| {
    match decode(frame) {
        None => assert!(frame.len() < 10, "{}-byte frame was rejected", frame.len()),
        Some(epc) => {
            assert!(frame.len() >= 10);
            assert_eq!(epc.as_bytes(), &frame[4..10]);

            let hex = epc.to_hex();
            assert_eq!(hex.len(), 12);
            assert!(hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
            assert_eq!(hex.parse::<Epc>().ok(), Some(epc));
        },
    }
});
