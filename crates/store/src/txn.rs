//! Transaction views over a store snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::codec::Codec;
use crate::error::StoreError;

/// Raw contents of one bucket.
pub(crate) type Table = BTreeMap<String, Vec<u8>>;

/// An immutable view of every bucket at one commit.
#[doc(hidden)]
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub(crate) buckets: BTreeMap<String, Arc<Table>>,
}

/// Read access shared by read-only and read-write transactions.
pub trait Txn {
    #[doc(hidden)]
    fn snapshot(&self) -> &Snapshot;

    fn has_bucket(&self, name: &str) -> bool {
        self.snapshot().buckets.contains_key(name)
    }

    /// Fetch and decode a value. `Ok(None)` when the key is absent.
    fn get<C: Codec>(&self, bucket: &Bucket<C>, key: &str) -> Result<Option<C::Value>, StoreError> {
        let table = table(self.snapshot(), bucket.name())?;
        match table.get(key) {
            None => Ok(None),
            Some(bytes) => bucket
                .codec()
                .decode(bytes)
                .map(Some)
                .map_err(|e| StoreError::codec(bucket.name(), e)),
        }
    }

    fn contains<C: Codec>(&self, bucket: &Bucket<C>, key: &str) -> Result<bool, StoreError> {
        Ok(table(self.snapshot(), bucket.name())?.contains_key(key))
    }

    /// Visit every entry in key order. The first visitor error stops the walk.
    fn for_each<C, F, E>(&self, bucket: &Bucket<C>, mut visit: F) -> Result<(), E>
    where
        C: Codec,
        F: FnMut(&str, C::Value) -> Result<(), E>,
        E: From<StoreError>,
    {
        let table = table(self.snapshot(), bucket.name())?;
        for (key, bytes) in table.iter() {
            let value = bucket
                .codec()
                .decode(bytes)
                .map_err(|e| StoreError::codec(bucket.name(), e))?;
            visit(key, value)?;
        }
        Ok(())
    }

    /// Number of keys in a bucket.
    fn len<C: Codec>(&self, bucket: &Bucket<C>) -> Result<usize, StoreError> {
        Ok(table(self.snapshot(), bucket.name())?.len())
    }
}

fn table<'a>(snapshot: &'a Snapshot, name: &str) -> Result<&'a Table, StoreError> {
    snapshot
        .buckets
        .get(name)
        .map(|t| t.as_ref())
        .ok_or_else(|| StoreError::MissingBucket(name.to_string()))
}

/// Read-only transaction over the snapshot current when it began.
#[derive(Debug)]
pub struct ReadTxn {
    snapshot: Arc<Snapshot>,
}

impl ReadTxn {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }
}

impl Txn for ReadTxn {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Read-write transaction.
///
/// Works on a private copy of the bucket index; a bucket's table is cloned the
/// first time it is written. Nothing is visible to other transactions until
/// the enclosing `Store::update` commits.
#[derive(Debug)]
pub struct WriteTxn {
    working: Snapshot,
    dirty: bool,
}

impl WriteTxn {
    pub(crate) fn new(base: Snapshot) -> Self {
        Self {
            working: base,
            dirty: false,
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn into_snapshot(self) -> Snapshot {
        self.working
    }

    /// Create a bucket if it does not exist. Returns `true` when created.
    pub fn create_bucket(&mut self, name: &str) -> bool {
        if self.working.buckets.contains_key(name) {
            return false;
        }
        self.working
            .buckets
            .insert(name.to_string(), Arc::new(Table::new()));
        self.dirty = true;
        true
    }

    pub fn put<C: Codec>(
        &mut self,
        bucket: &Bucket<C>,
        key: impl Into<String>,
        value: &C::Value,
    ) -> Result<(), StoreError> {
        let bytes = bucket
            .codec()
            .encode(value)
            .map_err(|e| StoreError::codec(bucket.name(), e))?;
        self.table_mut(bucket.name())?.insert(key.into(), bytes);
        self.dirty = true;
        Ok(())
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn delete<C: Codec>(&mut self, bucket: &Bucket<C>, key: &str) -> Result<bool, StoreError> {
        if !self.contains(bucket, key)? {
            return Ok(false);
        }
        self.table_mut(bucket.name())?.remove(key);
        self.dirty = true;
        Ok(true)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        let table = self
            .working
            .buckets
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingBucket(name.to_string()))?;
        Ok(Arc::make_mut(table))
    }
}

impl Txn for WriteTxn {
    fn snapshot(&self) -> &Snapshot {
        &self.working
    }
}
