//! Frame decoding.
//!
//! Readers push raw tag-read frames with no framing of their own. The tag
//! identifier sits at a fixed position: hex characters 8..20 of the
//! hex-encoded chunk, which is bytes 4..10 of the raw chunk.
//!
//! ```text
//! offset  0        4                        10
//!         +--------+------------------------+----------
//!         | header |   EPC (6 bytes)        | trailer...
//!         +--------+------------------------+----------
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Byte offset of the EPC within a frame.
pub const EPC_OFFSET: usize = 4;

/// EPC length in bytes (12 hex characters).
pub const EPC_LEN: usize = 6;

/// Shortest frame that carries a complete EPC.
pub const MIN_FRAME_LEN: usize = EPC_OFFSET + EPC_LEN;

/// Electronic Product Code extracted from a reader frame.
///
/// Always exactly six bytes; renders as twelve upper-case hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epc([u8; EPC_LEN]);

impl Epc {
    /// Wrap raw EPC bytes.
    pub const fn from_bytes(bytes: [u8; EPC_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw EPC bytes.
    pub const fn as_bytes(&self) -> &[u8; EPC_LEN] {
        &self.0
    }

    /// Upper-case hex rendering, as sent to the inventory service.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Rejected EPC text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EpcParseError {
    /// Not exactly 12 characters.
    #[error("EPC must be {expected} hex characters, got {actual}")]
    Length {
        /// Required length.
        expected: usize,
        /// Length of the input.
        actual: usize,
    },

    /// Contains a non-hex character.
    #[error("EPC is not valid hex: {0}")]
    Hex(String),
}

impl FromStr for Epc {
    type Err = EpcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != EPC_LEN * 2 {
            return Err(EpcParseError::Length { expected: EPC_LEN * 2, actual: s.len() });
        }

        let mut bytes = [0u8; EPC_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| EpcParseError::Hex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Epc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Epc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Extract the EPC from a single read chunk.
///
/// Returns `None` for chunks shorter than [`MIN_FRAME_LEN`] bytes (hex form
/// shorter than 20 characters). Anything after the EPC is ignored.
pub fn decode(frame: &[u8]) -> Option<Epc> {
    let bytes: [u8; EPC_LEN] = frame.get(EPC_OFFSET..MIN_FRAME_LEN)?.try_into().ok()?;
    Some(Epc(bytes))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn decode_extracts_bytes_four_to_ten() {
        let frame = hex!("CCFF0011 A1B2C3D4E5F6 0D0A");
        let epc = decode(&frame).unwrap();
        assert_eq!(epc.to_string(), "A1B2C3D4E5F6");
    }

    #[test]
    fn decode_accepts_exact_minimum_length() {
        let frame = hex!("00000000 112233445566");
        assert_eq!(decode(&frame).unwrap().to_hex(), "112233445566");
    }

    #[test]
    fn decode_rejects_short_frames() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&hex!("00000000 1122334455")), None);
    }

    #[test]
    fn rendering_is_upper_case() {
        let epc = Epc::from_bytes(hex!("abcdef012345"));
        assert_eq!(epc.to_hex(), "ABCDEF012345");
    }

    #[test]
    fn parse_is_case_insensitive() {
        let upper: Epc = "A1B2C3D4E5F6".parse().unwrap();
        let lower: Epc = "a1b2c3d4e5f6".parse().unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = "A1B2".parse::<Epc>().unwrap_err();
        assert_eq!(err, EpcParseError::Length { expected: 12, actual: 4 });
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(matches!("A1B2C3D4E5GZ".parse::<Epc>(), Err(EpcParseError::Hex(_))));
    }

    #[test]
    fn serializes_as_hex_string() {
        let epc = Epc::from_bytes(hex!("A1B2C3D4E5F6"));
        assert_eq!(serde_json::to_string(&epc).unwrap(), "\"A1B2C3D4E5F6\"");
    }

    proptest! {
        #[test]
        fn short_frames_never_decode(
            frame in proptest::collection::vec(any::<u8>(), 0..MIN_FRAME_LEN)
        ) {
            prop_assert_eq!(decode(&frame), None);
        }

        #[test]
        fn long_frames_yield_hex_chars_eight_to_twenty(
            frame in proptest::collection::vec(any::<u8>(), MIN_FRAME_LEN..256)
        ) {
            let hex_form = hex::encode_upper(&frame);
            let epc = decode(&frame);
            prop_assert_eq!(epc.map(|e| e.to_hex()), Some(hex_form[8..20].to_string()));
            prop_assert_eq!(decode(&frame), epc);
        }
    }
}
