//! Group membership per subject.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use gatehouse_core::UserId;
use gatehouse_store::{Bucket, JsonCodec, Store, StoreError, Txn};

pub const GROUPS_BUCKET: &str = "groups";

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group already set")]
    GroupAlreadySet,

    #[error("group not set")]
    GroupNotSet,

    #[error("group data corrupted: {0}")]
    Corrupted(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for GroupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingBucket(bucket) => {
                error!(bucket = %bucket, "groups bucket missing");
                GroupError::Corrupted(format!("missing bucket '{bucket}'"))
            }
            other => GroupError::Store(other),
        }
    }
}

/// The set of group labels a subject belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSet(BTreeSet<String>);

impl GroupSet {
    pub fn contains(&self, group: &str) -> bool {
        self.0.contains(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for GroupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Subject → group labels, stored in the `groups` bucket.
///
/// Updates decode an owned copy of the subject's set, change the copy and
/// write it back inside the same transaction.
#[derive(Debug, Clone)]
pub struct GroupStore {
    store: Store,
    bucket: Bucket<JsonCodec<GroupSet>>,
}

impl GroupStore {
    pub fn new(store: Store) -> Result<Self, GroupError> {
        store.ensure_buckets(&[GROUPS_BUCKET])?;
        Ok(Self {
            store,
            bucket: Bucket::new(GROUPS_BUCKET, JsonCodec::new()),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Add `groups` to the subject's membership.
    ///
    /// Fails with [`GroupError::GroupAlreadySet`] when every requested label
    /// is already present. Returns the resulting membership.
    pub fn set(&self, subject: &UserId, groups: &[&str]) -> Result<GroupSet, GroupError> {
        self.store.update(|tx| {
            let mut current = tx.get(&self.bucket, subject.as_str())?.unwrap_or_default();
            let mut added = 0usize;
            for group in groups {
                if current.0.insert((*group).to_string()) {
                    added += 1;
                }
            }
            if added == 0 {
                return Err(GroupError::GroupAlreadySet);
            }
            tx.put(&self.bucket, subject.as_str(), &current)?;
            debug!(subject = %subject, added, "groups set");
            Ok(current)
        })
    }

    /// Remove `groups` from the subject's membership.
    ///
    /// Fails with [`GroupError::GroupNotSet`] when none of the labels were
    /// present. The (possibly empty) set is kept.
    pub fn remove(&self, subject: &UserId, groups: &[&str]) -> Result<GroupSet, GroupError> {
        self.store.update(|tx| {
            let mut current = tx.get(&self.bucket, subject.as_str())?.unwrap_or_default();
            let removed = groups.iter().filter(|g| current.0.remove(**g)).count();
            if removed == 0 {
                return Err(GroupError::GroupNotSet);
            }
            tx.put(&self.bucket, subject.as_str(), &current)?;
            debug!(subject = %subject, removed, "groups removed");
            Ok(current)
        })
    }

    pub fn has(&self, subject: &UserId, group: &str) -> Result<bool, GroupError> {
        Ok(self.get(subject)?.contains(group))
    }

    /// Membership of `subject`; empty when the subject has none.
    pub fn get(&self, subject: &UserId) -> Result<GroupSet, GroupError> {
        self.store.read(|tx| self.membership_tx(tx, subject))
    }

    /// Membership read inside a caller's transaction.
    pub fn membership_tx<T: Txn>(&self, tx: &T, subject: &UserId) -> Result<GroupSet, GroupError> {
        Ok(tx.get(&self.bucket, subject.as_str())?.unwrap_or_default())
    }
}
