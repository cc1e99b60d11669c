use indexmap::IndexSet;
use rand::Rng;

use super::group_ops::create_group;
use super::{EntityKind, OpError};
use crate::model::store::Store;
use crate::model::{Group, GroupId, ItemId};

fn ensure_exists(store: &Store, item: ItemId, group: GroupId) -> Result<(), OpError> {
    if store.item(item).is_none() {
        return Err(OpError::ItemNotFound(item));
    }
    if store.group(group).is_none() {
        return Err(OpError::GroupNotFound(group));
    }
    Ok(())
}

/// Flip membership: remove the group if the item has it, append it otherwise.
/// Returns whether the item is a member afterwards.
pub fn toggle_membership(store: &mut Store, item: ItemId, group: GroupId) -> Result<bool, OpError> {
    ensure_exists(store, item, group)?;
    if store.unlink(item, group) {
        Ok(false)
    } else {
        store.link(item, group);
        Ok(true)
    }
}

/// Make the item a member. Returns false if it already was.
pub fn add_membership(store: &mut Store, item: ItemId, group: GroupId) -> Result<bool, OpError> {
    ensure_exists(store, item, group)?;
    Ok(store.link(item, group))
}

/// Remove the item from the group. Returns false if it was not a member.
pub fn remove_membership(store: &mut Store, item: ItemId, group: GroupId) -> Result<bool, OpError> {
    ensure_exists(store, item, group)?;
    Ok(store.unlink(item, group))
}

/// Replace an item's whole group set, as the item edit form does on save.
///
/// Every group is checked before anything changes. Groups the item keeps
/// retain their position; new ones are appended in the given order.
/// Returns whether the membership set changed.
pub fn set_memberships(store: &mut Store, item: ItemId, groups: &[GroupId]) -> Result<bool, OpError> {
    if store.item(item).is_none() {
        return Err(OpError::ItemNotFound(item));
    }
    if let Some(missing) = groups.iter().find(|g| store.group(**g).is_none()) {
        return Err(OpError::GroupNotFound(*missing));
    }

    let mut changed = false;
    for current in store.groups_of(item) {
        if !groups.contains(&current) {
            changed |= store.unlink(item, current);
        }
    }
    for group in groups {
        changed |= store.link(item, *group);
    }
    Ok(changed)
}

/// Quick "add group" from an item form.
///
/// If no group with this name exists (case-insensitive), one is created
/// through the group manager and added to `selected`. If it already exists,
/// nothing is created and `selected` is left alone. Returns the group and
/// whether it was created.
pub fn add_group_and_select(
    store: &mut Store,
    name: &str,
    selected: &mut IndexSet<GroupId>,
    rng: &mut impl Rng,
) -> Result<(Group, bool), OpError> {
    if name.trim().is_empty() {
        return Err(OpError::EmptyName(EntityKind::Group));
    }
    if let Some(existing) = store.group_by_name(name) {
        return Ok((existing.clone(), false));
    }
    let group = create_group(store, name, None, rng)?;
    selected.insert(group.id);
    Ok((group, true))
}
