//! Registry backed by the admin tool's JSON document.
//!
//! The document can change while the bridge runs. Every lookup checks the
//! file's modification time and length; when either moved, the document is
//! parsed again and the in-memory snapshot is swapped. A document that fails
//! to parse is logged and the previous snapshot stays in service.
//!
//! Live connections are unaffected by a reload: the driver copies the
//! identity out at accept time.

use std::{
    net::IpAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use parking_lot::RwLock;
use tagbridge_core::{ReaderIdentity, Registry, StaticRegistry};

use crate::{config::load_registry, error::ServerError};

/// What the file looked like when it was last read. `None` if absent.
type Fingerprint = Option<(Option<SystemTime>, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    std::fs::metadata(path).ok().map(|meta| (meta.modified().ok(), meta.len()))
}

struct Snapshot {
    seen: Fingerprint,
    registry: Arc<StaticRegistry>,
}

/// Reader registry that follows its document on disk.
pub struct FileRegistry {
    path: PathBuf,
    current: RwLock<Snapshot>,
}

impl FileRegistry {
    /// Load the document once and start following it.
    ///
    /// A missing file starts with an empty registry.
    ///
    /// # Errors
    ///
    /// Same as [`load_registry`]: a malformed document is fatal at startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        let seen = fingerprint(&path);
        let registry = Arc::new(load_registry(&path)?);

        Ok(Self { path, current: RwLock::new(Snapshot { seen, registry }) })
    }

    /// Document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot, reloading first if the document changed.
    pub fn snapshot(&self) -> Arc<StaticRegistry> {
        self.refresh();
        Arc::clone(&self.current.read().registry)
    }

    fn refresh(&self) {
        let now = fingerprint(&self.path);
        if self.current.read().seen == now {
            return;
        }

        // Parse outside the lock; lookups keep using the old snapshot.
        let loaded = load_registry(&self.path);

        let mut current = self.current.write();
        current.seen = now;
        match loaded {
            Ok(registry) => {
                tracing::info!(
                    path = %self.path.display(),
                    readers = registry.len(),
                    "registry reloaded"
                );
                current.registry = Arc::new(registry);
            },
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "registry reload failed, keeping previous: {}", e
            ),
        }
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Registry for FileRegistry {
    fn lookup(&self, ip: IpAddr) -> Option<ReaderIdentity> {
        self.snapshot().lookup(ip)
    }
}
