//! Reader registry.
//!
//! Maps a reader's IP address to the box it is mounted on. The registry is
//! maintained outside the bridge (an admin tool writes the JSON document); the
//! bridge only ever reads it.
//!
//! ## Design
//!
//! - Lookups clone the identity out: the listener snapshots it at accept time
//!   and a later registry change never reclassifies a live connection.
//! - Addresses are canonicalized, so a reader reaching a dual-stack socket as
//!   `::ffff:10.0.0.5` resolves the same as `10.0.0.5`.

use std::{
    collections::{HashMap, hash_map::Entry},
    net::IpAddr,
};

use serde::{Deserialize, Serialize};

/// Kind of box a reader is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxType {
    /// Library bookshelf.
    Shelf,
    /// Book return box.
    ReturnBox,
}

impl BoxType {
    /// Wire name (`"shelf"` / `"return_box"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shelf => "shelf",
            Self::ReturnBox => "return_box",
        }
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered identity of one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderIdentity {
    /// Reader address (canonical form).
    pub ip: IpAddr,
    /// What the reader is mounted on.
    pub box_type: BoxType,
    /// Human name of the shelf or box.
    pub name: String,
}

/// Read path of the reader registry.
pub trait Registry: Send + Sync {
    /// Resolve a peer address to a registered reader.
    ///
    /// Returns `None` for unknown addresses.
    fn lookup(&self, ip: IpAddr) -> Option<ReaderIdentity>;
}

/// One entry of the registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxEntry {
    /// Shelf or box name.
    pub name: String,
    /// Reader IP as written by the admin tool.
    pub ip: String,
}

/// The registry document.
///
/// ```json
/// { "shelves": [{"name": "Fiction-A", "ip": "10.0.0.5"}],
///   "return_boxes": [{"name": "Front desk", "ip": "10.0.1.2"}] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Readers mounted on shelves.
    #[serde(default)]
    pub shelves: Vec<BoxEntry>,
    /// Readers mounted on return boxes.
    #[serde(default)]
    pub return_boxes: Vec<BoxEntry>,
}

/// Errors building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An entry's `ip` is not an IP address.
    #[error("invalid reader IP {ip:?} for {name:?}")]
    InvalidIp {
        /// Entry name.
        name: String,
        /// Offending text.
        ip: String,
    },
}

/// Immutable in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    readers: HashMap<IpAddr, ReaderIdentity>,
}

impl StaticRegistry {
    /// Empty registry; every reader is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the registry document.
    ///
    /// Shelves are registered before return boxes, and the first entry for an
    /// address wins. Later duplicates are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidIp` if any entry has an unparsable `ip`.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        let entries = config
            .shelves
            .iter()
            .map(|e| (e, BoxType::Shelf))
            .chain(config.return_boxes.iter().map(|e| (e, BoxType::ReturnBox)));

        for (entry, box_type) in entries {
            let ip: IpAddr = entry.ip.trim().parse().map_err(|_| RegistryError::InvalidIp {
                name: entry.name.clone(),
                ip: entry.ip.clone(),
            })?;

            if !registry.insert(ReaderIdentity { ip, box_type, name: entry.name.clone() }) {
                tracing::warn!(
                    ip = %ip,
                    name = %entry.name,
                    box_type = %box_type,
                    "duplicate reader address, keeping first registration"
                );
            }
        }

        Ok(registry)
    }

    /// Register a reader. Returns `false` if the address was already taken.
    pub fn insert(&mut self, identity: ReaderIdentity) -> bool {
        let ip = identity.ip.to_canonical();
        match self.readers.entry(ip) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ReaderIdentity { ip, ..identity });
                true
            },
        }
    }

    /// Number of registered readers.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// True if no reader is registered.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl Registry for StaticRegistry {
    fn lookup(&self, ip: IpAddr) -> Option<ReaderIdentity> {
        self.readers.get(&ip.to_canonical()).cloned()
    }
}
