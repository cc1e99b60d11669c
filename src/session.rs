//! A working set bound to a durability backend.
//!
//! Every mutating operation validates, applies to the in-memory store, then
//! commits. Validation errors leave both memory and disk untouched. A commit
//! error leaves the change in memory (reads still see it), marks the session
//! as pending and is returned so the caller can report "not saved" and retry
//! with [`Session::commit`].

use indexmap::IndexSet;
use rand::Rng;

use crate::io::store_io::{Backend, StoreError};
use crate::model::store::Store;
use crate::model::{Group, GroupId, Item, ItemId, ViewConfig};
use crate::ops::projection::{Projection, project};
use crate::ops::{OpError, group_ops, item_ops, membership};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Op(#[from] OpError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// True when the change was applied in memory but did not reach the backend.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, SessionError::Store(StoreError::CommitFailure { .. }))
    }
}

pub struct Session<B: Backend> {
    store: Store,
    backend: B,
    pending: bool,
}

impl<B: Backend> Session<B> {
    pub fn new(store: Store, backend: B) -> Self {
        Session {
            store,
            backend,
            pending: false,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the in-memory state is ahead of what the backend holds.
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Push the current state to the backend. Safe to call again after a
    /// failure.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.backend.commit(&self.store)?;
        self.pending = false;
        Ok(())
    }

    /// Mark the store dirty and commit.
    fn changed(&mut self) -> Result<(), SessionError> {
        self.pending = true;
        self.commit()?;
        Ok(())
    }

    pub fn project(&self, config: &ViewConfig) -> Projection {
        project(&self.store, config)
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub fn create_item(&mut self, name: &str, count: i64) -> Result<Item, SessionError> {
        let item = item_ops::create_item(&mut self.store, name, count)?;
        self.changed()?;
        Ok(item)
    }

    /// Create an item inside the named groups, creating groups that do not
    /// exist yet (matched ignoring case). Everything lands in one commit, and
    /// a validation error anywhere leaves the store untouched.
    pub fn create_item_in_groups(
        &mut self,
        name: &str,
        count: i64,
        group_names: &[String],
    ) -> Result<Item, SessionError> {
        let mut draft = self.store.clone();
        let mut rng = rand::thread_rng();
        let mut selected = IndexSet::new();
        for group_name in group_names {
            let (group, _) =
                membership::add_group_and_select(&mut draft, group_name, &mut selected, &mut rng)?;
            selected.insert(group.id);
        }
        let item = item_ops::create_item(&mut draft, name, count)?;
        let groups: Vec<GroupId> = selected.into_iter().collect();
        membership::set_memberships(&mut draft, item.id, &groups)?;

        self.store = draft;
        self.changed()?;
        Ok(item)
    }

    pub fn rename_item(&mut self, id: ItemId, name: &str) -> Result<Item, SessionError> {
        let item = item_ops::rename_item(&mut self.store, id, name)?;
        self.changed()?;
        Ok(item)
    }

    pub fn delete_item(&mut self, id: ItemId) -> Result<Item, SessionError> {
        let item = item_ops::delete_item(&mut self.store, id)?;
        self.changed()?;
        Ok(item)
    }

    pub fn increment(&mut self, id: ItemId) -> Result<i64, SessionError> {
        let count = item_ops::increment(&mut self.store, id)?;
        self.changed()?;
        Ok(count)
    }

    /// Returns false, without committing, when the count is already zero.
    pub fn decrement(&mut self, id: ItemId) -> Result<bool, SessionError> {
        let changed = item_ops::decrement(&mut self.store, id)?;
        if changed {
            self.changed()?;
        }
        Ok(changed)
    }

    pub fn set_count(&mut self, id: ItemId, count: i64) -> Result<bool, SessionError> {
        let changed = item_ops::set_count(&mut self.store, id, count)?;
        if changed {
            self.changed()?;
        }
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub fn create_group(&mut self, name: &str, color: Option<&str>) -> Result<Group, SessionError> {
        self.create_group_with(name, color, &mut rand::thread_rng())
    }

    pub fn create_group_with(
        &mut self,
        name: &str,
        color: Option<&str>,
        rng: &mut impl Rng,
    ) -> Result<Group, SessionError> {
        let group = group_ops::create_group(&mut self.store, name, color, rng)?;
        self.changed()?;
        Ok(group)
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> Result<Group, SessionError> {
        let group = group_ops::rename_group(&mut self.store, id, name)?;
        self.changed()?;
        Ok(group)
    }

    pub fn recolor_group(&mut self, id: GroupId, color: Option<&str>) -> Result<String, SessionError> {
        let color = group_ops::recolor_group(&mut self.store, id, color, &mut rand::thread_rng())?;
        self.changed()?;
        Ok(color)
    }

    pub fn delete_group(&mut self, id: GroupId) -> Result<Group, SessionError> {
        let group = group_ops::delete_group(&mut self.store, id)?;
        self.changed()?;
        Ok(group)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Returns whether the item is a member afterwards.
    pub fn toggle_membership(&mut self, item: ItemId, group: GroupId) -> Result<bool, SessionError> {
        let member = membership::toggle_membership(&mut self.store, item, group)?;
        self.changed()?;
        Ok(member)
    }

    pub fn add_membership(&mut self, item: ItemId, group: GroupId) -> Result<bool, SessionError> {
        let changed = membership::add_membership(&mut self.store, item, group)?;
        if changed {
            self.changed()?;
        }
        Ok(changed)
    }

    pub fn remove_membership(&mut self, item: ItemId, group: GroupId) -> Result<bool, SessionError> {
        let changed = membership::remove_membership(&mut self.store, item, group)?;
        if changed {
            self.changed()?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store_io::MemoryBackend;
    use crate::ops::EntityKind;
    use pretty_assertions::assert_eq;

    fn session() -> Session<MemoryBackend> {
        Session::new(Store::new(), MemoryBackend::new())
    }

    #[test]
    fn every_mutation_commits() {
        let mut s = session();
        let item = s.create_item("Coffee", 0).unwrap();
        let group = s.create_group("Drinks", None).unwrap();
        s.increment(item.id).unwrap();
        s.toggle_membership(item.id, group.id).unwrap();

        assert_eq!(s.backend().snapshots.len(), 4);
        let committed = s.backend().last_committed().unwrap();
        assert_eq!(committed.item(item.id).unwrap().count, 1);
        assert!(committed.is_member(item.id, group.id));
        assert!(!s.has_pending());
    }

    #[test]
    fn validation_errors_do_not_commit() {
        let mut s = session();
        s.create_group("Work", None).unwrap();

        let err = s.create_group("work", None).unwrap_err();
        assert!(matches!(err, SessionError::Op(OpError::DuplicateName(_))));
        let err = s.create_item("  ", 0).unwrap_err();
        assert!(matches!(err, SessionError::Op(OpError::EmptyName(EntityKind::Item))));

        assert_eq!(s.backend().snapshots.len(), 1);
        assert_eq!(s.store().group_count(), 1);
    }

    #[test]
    fn no_op_changes_do_not_commit() {
        let mut s = session();
        let item = s.create_item("Laps", 0).unwrap();
        assert!(!s.decrement(item.id).unwrap());
        assert!(!s.set_count(item.id, 0).unwrap());
        assert_eq!(s.backend().snapshots.len(), 1);
    }

    #[test]
    fn commit_failure_keeps_memory_and_can_be_retried() {
        let mut s = Session::new(Store::new(), MemoryBackend::failing(1));

        let err = s.create_item("Water", 2).unwrap_err();
        assert!(err.is_commit_failure());
        assert!(err.to_string().starts_with("not saved"));

        // Read-your-writes: the item is visible even though it is not durable
        assert_eq!(s.store().item_count(), 1);
        assert!(s.has_pending());
        assert!(s.backend().last_committed().is_none());

        s.commit().unwrap();
        assert!(!s.has_pending());
        assert_eq!(s.backend().last_committed().unwrap().item_count(), 1);
    }

    #[test]
    fn delete_item_removes_memberships_and_commits() {
        let mut s = session();
        let item = s.create_item("Coffee", 0).unwrap();
        let group = s.create_group("Drinks", None).unwrap();
        s.add_membership(item.id, group.id).unwrap();

        s.delete_item(item.id).unwrap();
        let committed = s.backend().last_committed().unwrap();
        assert!(committed.item(item.id).is_none());
        assert!(committed.members_of(group.id).is_empty());
    }

    #[test]
    fn create_item_in_groups_is_one_commit() {
        let mut s = session();
        s.create_group("Gym", None).unwrap();

        let names = vec!["gym".to_string(), "Daily".to_string(), "GYM".to_string()];
        let item = s.create_item_in_groups("Squats", 3, &names).unwrap();
        assert_eq!(s.backend().snapshots.len(), 2);

        let committed = s.backend().last_committed().unwrap();
        let daily = committed.group_by_name("daily").unwrap().id;
        assert_eq!(committed.group_count(), 2);
        assert_eq!(committed.groups_of(item.id), vec![GroupId(1), daily]);
        assert_eq!(committed.item(item.id).unwrap().count, 3);
    }

    #[test]
    fn create_item_in_groups_rejects_everything_on_a_bad_name() {
        let mut s = session();
        let err = s
            .create_item_in_groups("Squats", 0, &["New".to_string(), "  ".to_string()])
            .unwrap_err();
        assert!(matches!(err, SessionError::Op(OpError::EmptyName(EntityKind::Group))));

        let err = s.create_item_in_groups("  ", 0, &["New".to_string()]).unwrap_err();
        assert!(matches!(err, SessionError::Op(OpError::EmptyName(EntityKind::Item))));

        assert_eq!(s.store().group_count(), 0);
        assert_eq!(s.store().item_count(), 0);
        assert!(s.backend().snapshots.is_empty());
    }

    #[test]
    fn create_item_in_groups_failed_commit_is_all_pending() {
        let mut s = Session::new(Store::new(), MemoryBackend::failing(1));
        let err = s.create_item_in_groups("Squats", 0, &["Gym".to_string()]).unwrap_err();
        assert!(err.is_commit_failure());
        assert!(s.has_pending());
        assert_eq!(s.store().group_count(), 1);

        s.commit().unwrap();
        let committed = s.backend().last_committed().unwrap();
        assert_eq!(committed.item_count(), 1);
        assert_eq!(committed.members_of(GroupId(1)), vec![ItemId(1)]);
        assert_eq!(s.backend().snapshots.len(), 1);
    }

    #[test]
    fn projection_reflects_uncommitted_state() {
        let mut s = Session::new(Store::new(), MemoryBackend::failing(2));
        let _ = s.create_item("b", 0);
        let _ = s.create_item("a", 0);
        let view = ViewConfig {
            grouped: false,
            ..ViewConfig::default()
        };
        assert_eq!(s.project(&view), Projection::Flat(vec![ItemId(2), ItemId(1)]));
    }

    #[test]
    fn group_lifecycle() {
        let mut s = session();
        let group = s.create_group("Errands", Some("#abcdef")).unwrap();
        assert_eq!(group.color, "#ABCDEF");

        let renamed = s.rename_group(group.id, "Chores").unwrap();
        assert_eq!(renamed.name, "Chores");

        let color = s.recolor_group(group.id, Some("123456")).unwrap();
        assert_eq!(color, "#123456");

        s.delete_group(group.id).unwrap();
        assert_eq!(s.store().group_count(), 0);
        assert_eq!(s.backend().snapshots.len(), 4);
    }
}
