//! The store handle and its transaction entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cipher::SnapshotCipher;
use crate::error::StoreError;
use crate::snapshot;
use crate::txn::{ReadTxn, Snapshot, WriteTxn};

#[derive(Debug)]
struct Inner {
    name: String,
    path: Option<PathBuf>,
    cipher: Option<SnapshotCipher>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
    current: RwLock<Arc<Snapshot>>,
}

/// Embedded transactional store.
///
/// - One writer at a time; concurrent `update` calls queue on the writer lock.
/// - Readers see the snapshot committed last before their `read` began and
///   are never blocked by a writer in progress.
/// - A failed `update` closure discards its working copy: nothing it wrote
///   becomes visible.
///
/// Cloning the handle shares the same underlying store.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// A store that lives only in memory.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), None, None, Snapshot::default())
    }

    /// Open (or create) a file-backed store at `<dir>/<name>.db`.
    pub fn open(dir: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, StoreError> {
        Self::open_with(dir.as_ref(), name.into(), None)
    }

    /// Like [`open`](Self::open), but the file is encrypted at rest with
    /// `cipher`. Opening an existing file with the wrong key fails.
    pub fn open_encrypted(
        dir: impl AsRef<Path>,
        name: impl Into<String>,
        cipher: SnapshotCipher,
    ) -> Result<Self, StoreError> {
        Self::open_with(dir.as_ref(), name.into(), Some(cipher))
    }

    fn open_with(
        dir: &Path,
        name: String,
        cipher: Option<SnapshotCipher>,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.db"));

        let snapshot = snapshot::load(&path, cipher.as_ref())?.unwrap_or_default();
        info!(
            store = %name,
            path = %path.display(),
            buckets = snapshot.buckets.len(),
            encrypted = cipher.is_some(),
            "store opened"
        );

        Ok(Self::from_parts(name, Some(path), cipher, snapshot))
    }

    fn from_parts(
        name: String,
        path: Option<PathBuf>,
        cipher: Option<SnapshotCipher>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                path,
                cipher,
                writer: Mutex::new(()),
                current: RwLock::new(Arc::new(snapshot)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Run a read-write transaction.
    ///
    /// The closure's writes commit only if it returns `Ok`. For file-backed
    /// stores the snapshot file is rewritten before the commit becomes
    /// visible; if that write fails the transaction fails.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _writer = self.inner.writer.lock();
        let base = Arc::clone(&self.inner.current.read());

        let mut txn = WriteTxn::new((*base).clone());
        let out = f(&mut txn)?;

        if txn.is_dirty() {
            let next = Arc::new(txn.into_snapshot());
            if let Some(path) = &self.inner.path {
                snapshot::write(path, &next, self.inner.cipher.as_ref())?;
            }
            *self.inner.current.write() = next;
            debug!(store = %self.inner.name, "transaction committed");
        }

        Ok(out)
    }

    /// Run a read-only transaction against the latest committed snapshot.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn) -> Result<T, E>,
    {
        let snapshot = Arc::clone(&self.inner.current.read());
        f(&ReadTxn::new(snapshot))
    }

    /// Create every named bucket that does not exist yet.
    pub fn ensure_buckets(&self, names: &[&str]) -> Result<(), StoreError> {
        self.update(|tx| {
            for name in names {
                tx.create_bucket(name);
            }
            Ok::<_, StoreError>(())
        })
    }
}
