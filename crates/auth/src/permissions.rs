//! Resource permissions as per-group action bitmasks.
//!
//! Each resource maps group labels to an [`Action`] mask. A subject may act
//! on a resource when at least one of its groups holds every requested bit.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use gatehouse_core::UserId;
use gatehouse_store::{Bucket, JsonCodec, StoreError, Txn, WriteTxn};

use crate::groups::{GroupError, GroupSet, GroupStore};

pub const RESOURCES_BUCKET: &str = "resources";

bitflags! {
    /// Actions a group may perform on a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Action: u8 {
        const READ = 1;
        const WRITE = 1 << 1;
        const DELETE = 1 << 2;
    }
}

impl Action {
    pub const NONE: Action = Action::empty();

    /// Parse a raw mask, rejecting bits that name no action.
    pub fn from_raw(bits: u8) -> Result<Self, PermissionError> {
        Action::from_bits(bits).ok_or(PermissionError::InvalidActions(bits))
    }

    pub fn is_known(self) -> bool {
        Action::all().contains(self)
    }
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("invalid action bits {0:#010b}")]
    InvalidActions(u8),

    #[error("permissions unchanged")]
    PermissionsUnchanged,

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error("permission data corrupted: {0}")]
    Corrupted(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for PermissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingBucket(bucket) => {
                error!(bucket = %bucket, "resources bucket missing");
                PermissionError::Corrupted(format!("missing bucket '{bucket}'"))
            }
            other => PermissionError::Store(other),
        }
    }
}

/// Group label → raw action mask for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct ResourceAcl(BTreeMap<String, u8>);

impl ResourceAcl {
    fn mask(&self, group: &str) -> Action {
        self.0
            .get(group)
            .map_or(Action::NONE, |bits| Action::from_bits_retain(*bits))
    }
}

/// Grants and checks resource permissions for group members.
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    groups: GroupStore,
    resources: Bucket<JsonCodec<ResourceAcl>>,
}

impl PermissionEngine {
    /// Build on the group store's backing store.
    pub fn new(groups: GroupStore) -> Result<Self, PermissionError> {
        groups.store().ensure_buckets(&[RESOURCES_BUCKET])?;
        Ok(Self {
            groups,
            resources: Bucket::new(RESOURCES_BUCKET, JsonCodec::new()),
        })
    }

    pub fn group_store(&self) -> &GroupStore {
        &self.groups
    }

    /// Grant `actions` to `group` on `resource`, on top of what it holds.
    ///
    /// Nothing is written when the grant adds no new bit.
    pub fn set_permissions(
        &self,
        resource: &str,
        group: &str,
        actions: Action,
    ) -> Result<Action, PermissionError> {
        if !actions.is_known() {
            return Err(PermissionError::InvalidActions(actions.bits()));
        }
        let granted = self.groups.store().update(|tx| {
            let mut acl = tx.get(&self.resources, resource)?.unwrap_or_default();
            let current = acl.mask(group);
            let next = current | actions;
            if next == current {
                return Err(PermissionError::PermissionsUnchanged);
            }
            acl.0.insert(group.to_string(), next.bits());
            tx.put(&self.resources, resource, &acl)?;
            Ok(next)
        })?;

        info!(resource, group, actions = granted.bits(), "permissions granted");
        Ok(granted)
    }

    /// Clear `actions` from `group` on `resource`.
    ///
    /// A group left with no bits is dropped from the resource.
    pub fn revoke_permissions(
        &self,
        resource: &str,
        group: &str,
        actions: Action,
    ) -> Result<Action, PermissionError> {
        if !actions.is_known() {
            return Err(PermissionError::InvalidActions(actions.bits()));
        }
        let left = self.groups.store().update(|tx| {
            let mut acl = tx.get(&self.resources, resource)?.unwrap_or_default();
            let current = acl.mask(group);
            let next = current - actions;
            if next == current {
                return Err(PermissionError::PermissionsUnchanged);
            }
            if next.is_empty() {
                acl.0.remove(group);
            } else {
                acl.0.insert(group.to_string(), next.bits());
            }
            self.write_acl(tx, resource, &acl)?;
            Ok(next)
        })?;

        info!(resource, group, actions = left.bits(), "permissions revoked");
        Ok(left)
    }

    /// Drop every permission `group` holds on `resource`.
    ///
    /// Fails with [`GroupError::GroupNotSet`] when the group has no entry.
    pub fn remove_group(&self, resource: &str, group: &str) -> Result<(), PermissionError> {
        self.groups.store().update(|tx| {
            let mut acl = tx.get(&self.resources, resource)?.unwrap_or_default();
            if acl.0.remove(group).is_none() {
                return Err(PermissionError::Group(GroupError::GroupNotSet));
            }
            self.write_acl(tx, resource, &acl)
        })?;
        info!(resource, group, "group removed from resource");
        Ok(())
    }

    fn write_acl(
        &self,
        tx: &mut WriteTxn,
        resource: &str,
        acl: &ResourceAcl,
    ) -> Result<(), PermissionError> {
        if acl.0.is_empty() {
            tx.delete(&self.resources, resource)?;
        } else {
            tx.put(&self.resources, resource, acl)?;
        }
        Ok(())
    }

    /// The mask `group` holds on `resource`; empty when unset.
    pub fn get(&self, resource: &str, group: &str) -> Result<Action, PermissionError> {
        self.groups.store().read(|tx| {
            Ok(tx
                .get(&self.resources, resource)?
                .map_or(Action::NONE, |acl| acl.mask(group)))
        })
    }

    /// Whether `subject` may perform `action` on `resource`.
    ///
    /// Membership and the resource's grants are read in one transaction.
    /// The empty action is always allowed; an unknown subject or resource is
    /// denied. Storage failures are returned, not treated as a denial.
    pub fn can(&self, subject: &UserId, resource: &str, action: Action) -> Result<bool, PermissionError> {
        if action.is_empty() {
            return Ok(true);
        }
        self.groups.store().read(|tx| {
            let Some(acl) = tx.get(&self.resources, resource)? else {
                return Ok(false);
            };
            let membership = self.groups.membership_tx(tx, subject)?;
            let allowed = membership.iter().any(|group| acl.mask(group).contains(action));
            debug!(subject = %subject, resource, action = action.bits(), allowed, "permission check");
            Ok(allowed)
        })
    }

    /// Delegates to the group store.
    pub fn groups(&self, subject: &UserId) -> Result<GroupSet, PermissionError> {
        Ok(self.groups.get(subject)?)
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_store::Store;

    use super::*;

    fn engine() -> PermissionEngine {
        let groups = GroupStore::new(Store::in_memory("authz")).unwrap();
        PermissionEngine::new(groups).unwrap()
    }

    #[test]
    fn editors_can_read_and_write_doc1() {
        let engine = engine();
        let alice = UserId::new("1");
        let bob = UserId::new("2");
        engine.group_store().set(&alice, &["editors"]).unwrap();

        engine
            .set_permissions("doc1", "editors", Action::READ | Action::WRITE)
            .unwrap();

        assert!(engine.can(&alice, "doc1", Action::READ).unwrap());
        assert!(engine.can(&alice, "doc1", Action::WRITE).unwrap());
        assert!(engine.can(&alice, "doc1", Action::READ | Action::WRITE).unwrap());
        assert!(!engine.can(&alice, "doc1", Action::DELETE).unwrap());
        assert!(!engine.can(&bob, "doc1", Action::READ).unwrap());
        assert!(!engine.can(&alice, "doc2", Action::READ).unwrap());
    }

    #[test]
    fn empty_action_is_always_allowed() {
        let engine = engine();
        assert!(engine.can(&UserId::new("404"), "nothing", Action::NONE).unwrap());
    }

    #[test]
    fn repeated_grant_is_unchanged_and_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), "authz").unwrap();
        let durable = PermissionEngine::new(GroupStore::new(store).unwrap()).unwrap();
        durable.set_permissions("doc1", "editors", Action::READ).unwrap();
        let path = durable.group_store().store().path().unwrap().to_path_buf();
        let before = std::fs::read(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert!(matches!(
            durable.set_permissions("doc1", "editors", Action::READ),
            Err(PermissionError::PermissionsUnchanged)
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);

        let combined = durable
            .set_permissions("doc1", "editors", Action::READ | Action::DELETE)
            .unwrap();
        assert_eq!(combined, Action::READ | Action::DELETE);
    }

    #[test]
    fn unknown_bits_are_rejected() {
        let engine = engine();
        let bogus = Action::from_bits_retain(0b1000);
        assert!(matches!(
            engine.set_permissions("doc1", "editors", bogus),
            Err(PermissionError::InvalidActions(8))
        ));
        assert!(matches!(
            Action::from_raw(0b1001),
            Err(PermissionError::InvalidActions(9))
        ));
        assert_eq!(Action::from_raw(5).unwrap(), Action::READ | Action::DELETE);
    }

    #[test]
    fn any_single_group_must_hold_every_bit() {
        let engine = engine();
        let carol = UserId::new("3");
        engine.group_store().set(&carol, &["readers", "writers"]).unwrap();
        engine.set_permissions("doc1", "readers", Action::READ).unwrap();
        engine.set_permissions("doc1", "writers", Action::WRITE).unwrap();

        assert!(engine.can(&carol, "doc1", Action::READ).unwrap());
        assert!(engine.can(&carol, "doc1", Action::WRITE).unwrap());
        assert!(!engine.can(&carol, "doc1", Action::READ | Action::WRITE).unwrap());
    }

    #[test]
    fn revoke_and_remove_group() {
        let engine = engine();
        let dave = UserId::new("4");
        engine.group_store().set(&dave, &["editors"]).unwrap();
        engine.set_permissions("doc1", "editors", Action::all()).unwrap();

        let left = engine
            .revoke_permissions("doc1", "editors", Action::DELETE)
            .unwrap();
        assert_eq!(left, Action::READ | Action::WRITE);
        assert!(!engine.can(&dave, "doc1", Action::DELETE).unwrap());
        assert!(matches!(
            engine.revoke_permissions("doc1", "editors", Action::DELETE),
            Err(PermissionError::PermissionsUnchanged)
        ));

        engine.remove_group("doc1", "editors").unwrap();
        assert_eq!(engine.get("doc1", "editors").unwrap(), Action::NONE);
        assert!(!engine.can(&dave, "doc1", Action::READ).unwrap());
        assert!(matches!(
            engine.remove_group("doc1", "editors"),
            Err(PermissionError::Group(GroupError::GroupNotSet))
        ));
    }

    #[test]
    fn removing_an_unset_group_is_group_not_set() {
        let engine = engine();
        assert!(matches!(
            engine.remove_group("doc1", "editors"),
            Err(PermissionError::Group(GroupError::GroupNotSet))
        ));

        engine.set_permissions("doc1", "viewers", Action::READ).unwrap();
        assert!(matches!(
            engine.remove_group("doc1", "editors"),
            Err(PermissionError::Group(GroupError::GroupNotSet))
        ));
        assert_eq!(engine.get("doc1", "viewers").unwrap(), Action::READ);
    }

    #[test]
    fn groups_delegates_to_the_group_store() {
        let engine = engine();
        let erin = UserId::new("5");
        engine.group_store().set(&erin, &["ops"]).unwrap();
        assert!(engine.groups(&erin).unwrap().contains("ops"));
    }
}
