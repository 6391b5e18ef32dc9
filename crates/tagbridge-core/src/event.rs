//! Presence event sent to the inventory service.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::{epc::Epc, registry::BoxType};

/// One appear/disappear transition, as posted to the inventory service.
///
/// ```json
/// { "readerIp": "10.0.0.5", "epc": "A1B2C3D4E5F6", "type": "shelf", "detected": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    /// Reader that saw (or lost) the tag.
    pub reader_ip: IpAddr,
    /// Tag identifier.
    pub epc: Epc,
    /// Kind of box the reader is mounted on.
    #[serde(rename = "type")]
    pub box_type: BoxType,
    /// `true` when the tag appeared, `false` when it disappeared.
    pub detected: bool,
}

impl PresenceEvent {
    /// Tag appeared at a reader.
    pub fn appeared(reader_ip: IpAddr, epc: Epc, box_type: BoxType) -> Self {
        Self { reader_ip, epc, box_type, detected: true }
    }

    /// Tag is no longer seen at a reader.
    pub fn disappeared(reader_ip: IpAddr, epc: Epc, box_type: BoxType) -> Self {
        Self { reader_ip, epc, box_type, detected: false }
    }
}
