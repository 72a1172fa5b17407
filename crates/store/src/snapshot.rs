//! Whole-store snapshot file.
//!
//! Optionally encrypted with a [`SnapshotCipher`]. The file is replaced
//! atomically: the new contents go to a sibling temp file which is synced and
//! then renamed over the old one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cipher::SnapshotCipher;
use crate::error::StoreError;
use crate::txn::{Snapshot, Table};

pub(crate) fn load(
    path: &Path,
    cipher: Option<&SnapshotCipher>,
) -> Result<Option<Snapshot>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let bytes = match cipher {
        Some(cipher) => cipher.open(&bytes)?,
        None => bytes,
    };
    let raw: BTreeMap<String, Table> = bincode::deserialize(&bytes)?;
    let buckets = raw
        .into_iter()
        .map(|(name, table)| (name, Arc::new(table)))
        .collect();
    Ok(Some(Snapshot { buckets }))
}

pub(crate) fn write(
    path: &Path,
    snapshot: &Snapshot,
    cipher: Option<&SnapshotCipher>,
) -> Result<(), StoreError> {
    let view: BTreeMap<&str, &Table> = snapshot
        .buckets
        .iter()
        .map(|(name, table)| (name.as_str(), table.as_ref()))
        .collect();
    let mut bytes = bincode::serialize(&view)?;
    if let Some(cipher) = cipher {
        bytes = cipher.seal(&bytes)?;
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
