use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::group::{Group, GroupId};
use super::item::{Item, ItemId};

/// Current on-disk format version of `store.json`.
pub const STORE_VERSION: u32 = 1;

/// Case-insensitive name comparison used for every uniqueness check.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// The in-memory working set of items, groups and their membership relation.
///
/// All reads see every prior mutation. Nothing here touches disk; durability
/// is the job of a `Backend` (see `io::store_io`).
///
/// Items and groups keep insertion order, which is the "original order" the
/// projection's stable sort preserves. The relation is stored exactly once,
/// as a set of `(item, group)` pairs; both directions are derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoreFile", into = "StoreFile")]
pub struct Store {
    next_item_id: u32,
    next_group_id: u32,
    items: IndexMap<ItemId, Item>,
    groups: IndexMap<GroupId, Group>,
    memberships: IndexSet<(ItemId, GroupId)>,
}

/// Take the next id from a counter. `u32::MAX` is never handed out, so a
/// counter sitting there means the id space is exhausted.
fn next_id(counter: &mut u32) -> Option<u32> {
    let id = *counter;
    *counter = id.checked_add(1)?;
    Some(id)
}

impl Default for Store {
    fn default() -> Self {
        Store {
            next_item_id: 1,
            next_group_id: 1,
            items: IndexMap::new(),
            groups: IndexMap::new(),
            memberships: IndexSet::new(),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Insert a new item and assign it the next free id. No validation.
    ///
    /// Returns `None` once the id space is used up.
    pub fn insert_item(&mut self, name: String, count: i64) -> Option<&Item> {
        let id = ItemId(next_id(&mut self.next_item_id)?);
        debug_assert!(!self.items.contains_key(&id), "item id {id} reused");
        self.items.insert(id, Item::new(id, name, count));
        self.items.get(&id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    /// All items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn find_items(&self, pred: impl Fn(&Item) -> bool) -> Vec<&Item> {
        self.items.values().filter(|item| pred(item)).collect()
    }

    /// Remove an item together with all of its memberships.
    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let removed = self.items.shift_remove(&id)?;
        self.memberships.retain(|(item, _)| *item != id);
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Insert a new group and assign it the next free id. No validation.
    ///
    /// Returns `None` once the id space is used up.
    pub fn insert_group(&mut self, name: String, color: String) -> Option<&Group> {
        let id = GroupId(next_id(&mut self.next_group_id)?);
        debug_assert!(!self.groups.contains_key(&id), "group id {id} reused");
        self.groups.insert(id, Group::new(id, name, color));
        self.groups.get(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    /// All groups in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn find_groups(&self, pred: impl Fn(&Group) -> bool) -> Vec<&Group> {
        self.groups.values().filter(|group| pred(group)).collect()
    }

    /// Look up a group by name, ignoring case and surrounding whitespace.
    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.values().find(|g| names_match(&g.name, name))
    }

    /// Remove a group together with all of its memberships.
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let removed = self.groups.shift_remove(&id)?;
        self.memberships.retain(|(_, group)| *group != id);
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Membership relation
    // -----------------------------------------------------------------------

    /// Add `item` to `group`. Returns false if either side is missing or the
    /// membership already exists.
    pub fn link(&mut self, item: ItemId, group: GroupId) -> bool {
        if !self.items.contains_key(&item) || !self.groups.contains_key(&group) {
            return false;
        }
        self.memberships.insert((item, group))
    }

    /// Remove `item` from `group`. Returns false if it was not a member.
    pub fn unlink(&mut self, item: ItemId, group: GroupId) -> bool {
        self.memberships.shift_remove(&(item, group))
    }

    pub fn is_member(&self, item: ItemId, group: GroupId) -> bool {
        self.memberships.contains(&(item, group))
    }

    /// Groups of an item, in the order the memberships were added.
    pub fn groups_of(&self, item: ItemId) -> Vec<GroupId> {
        self.memberships
            .iter()
            .filter(|(i, _)| *i == item)
            .map(|(_, g)| *g)
            .collect()
    }

    /// Members of a group, in the order the memberships were added.
    pub fn members_of(&self, group: GroupId) -> Vec<ItemId> {
        self.memberships
            .iter()
            .filter(|(_, g)| *g == group)
            .map(|(i, _)| *i)
            .collect()
    }

    pub fn memberships(&self) -> impl Iterator<Item = &(ItemId, GroupId)> {
        self.memberships.iter()
    }
}

// ---------------------------------------------------------------------------
// On-disk representation
// ---------------------------------------------------------------------------

/// The serialized shape of `store.json`.
///
/// Kept separate from `Store` so hand-edited files can be inspected as-is by
/// `ops::check` before they are normalized into a working set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub next_item_id: u32,
    #[serde(default)]
    pub next_group_id: u32,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

/// One row of the membership relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub item: ItemId,
    pub group: GroupId,
}

impl From<StoreFile> for Store {
    /// Normalize a raw file: first occurrence of a duplicate id wins, rows that
    /// point at missing entities are dropped, and the id counters are raised
    /// above every id in use.
    fn from(file: StoreFile) -> Self {
        let mut items = IndexMap::new();
        for item in file.items {
            items.entry(item.id).or_insert(item);
        }
        let mut groups = IndexMap::new();
        for group in file.groups {
            groups.entry(group.id).or_insert(group);
        }
        let memberships = file
            .memberships
            .into_iter()
            .filter(|m| items.contains_key(&m.item) && groups.contains_key(&m.group))
            .map(|m| (m.item, m.group))
            .collect();

        let max_item = items.keys().map(|id: &ItemId| id.0).max().unwrap_or(0);
        let max_group = groups.keys().map(|id: &GroupId| id.0).max().unwrap_or(0);

        Store {
            next_item_id: file.next_item_id.max(max_item.saturating_add(1)),
            next_group_id: file.next_group_id.max(max_group.saturating_add(1)),
            items,
            groups,
            memberships,
        }
    }
}

impl From<Store> for StoreFile {
    fn from(store: Store) -> Self {
        StoreFile {
            version: STORE_VERSION,
            next_item_id: store.next_item_id,
            next_group_id: store.next_group_id,
            items: store.items.into_values().collect(),
            groups: store.groups.into_values().collect(),
            memberships: store
                .memberships
                .into_iter()
                .map(|(item, group)| Membership { item, group })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (Store, ItemId, ItemId, GroupId, GroupId) {
        let mut store = Store::new();
        let a = store.insert_item("Apples".into(), 3).unwrap().id;
        let b = store.insert_item("Pears".into(), 0).unwrap().id;
        let fruit = store.insert_group("Fruit".into(), "#FF5733".into()).unwrap().id;
        let green = store.insert_group("Green".into(), "#33FF57".into()).unwrap().id;
        (store, a, b, fruit, green)
    }

    #[test]
    fn ids_are_sequential_and_not_reused() {
        let mut store = Store::new();
        let a = store.insert_item("a".into(), 0).unwrap().id;
        let b = store.insert_item("b".into(), 0).unwrap().id;
        assert_eq!((a, b), (ItemId(1), ItemId(2)));

        store.remove_item(b);
        let c = store.insert_item("c".into(), 0).unwrap().id;
        assert_eq!(c, ItemId(3));
    }

    #[test]
    fn relation_is_visible_from_both_sides() {
        let (mut store, a, b, fruit, green) = sample();
        assert!(store.link(a, fruit));
        assert!(store.link(a, green));
        assert!(store.link(b, fruit));

        assert_eq!(store.groups_of(a), vec![fruit, green]);
        assert_eq!(store.members_of(fruit), vec![a, b]);
        assert!(store.is_member(b, fruit));
        assert!(!store.is_member(b, green));
    }

    #[test]
    fn find_by_predicate() {
        let (store, a, _, _, green) = sample();
        let stocked: Vec<ItemId> = store.find_items(|i| i.count > 0).iter().map(|i| i.id).collect();
        assert_eq!(stocked, vec![a]);
        let g: Vec<GroupId> = store.find_groups(|g| g.name.starts_with('G')).iter().map(|g| g.id).collect();
        assert_eq!(g, vec![green]);
    }

    #[test]
    fn link_rejects_missing_entities_and_duplicates() {
        let (mut store, a, _, fruit, _) = sample();
        assert!(!store.link(ItemId(99), fruit));
        assert!(!store.link(a, GroupId(99)));
        assert!(store.link(a, fruit));
        assert!(!store.link(a, fruit));
        assert_eq!(store.memberships().count(), 1);
    }

    #[test]
    fn unlink_preserves_append_order_of_remaining_groups() {
        let (mut store, a, _, fruit, green) = sample();
        let extra = store.insert_group("Extra".into(), "#3357FF".into()).unwrap().id;
        store.link(a, fruit);
        store.link(a, green);
        store.link(a, extra);

        assert!(store.unlink(a, green));
        assert!(!store.unlink(a, green));
        assert_eq!(store.groups_of(a), vec![fruit, extra]);
    }

    #[test]
    fn removing_an_item_drops_its_memberships() {
        let (mut store, a, b, fruit, _) = sample();
        store.link(a, fruit);
        store.link(b, fruit);

        let removed = store.remove_item(a).unwrap();
        assert_eq!(removed.name, "Apples");
        assert_eq!(store.members_of(fruit), vec![b]);
        assert!(store.item(a).is_none());
    }

    #[test]
    fn removing_a_group_drops_it_from_every_member() {
        let (mut store, a, b, fruit, green) = sample();
        store.link(a, fruit);
        store.link(a, green);
        store.link(b, fruit);

        store.remove_group(fruit);
        assert_eq!(store.groups_of(a), vec![green]);
        assert!(store.groups_of(b).is_empty());
    }

    #[test]
    fn group_by_name_ignores_case_and_whitespace() {
        let (store, _, _, fruit, _) = sample();
        assert_eq!(store.group_by_name("  fRuIt ").map(|g| g.id), Some(fruit));
        assert!(store.group_by_name("Vegetables").is_none());
    }

    #[test]
    fn json_shape_and_reload() {
        let (mut store, a, _, fruit, _) = sample();
        store.link(a, fruit);

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["next_item_id"], 3);
        assert_eq!(json["memberships"][0]["item"], 1);
        assert_eq!(json["memberships"][0]["group"], 1);

        let reloaded: Store = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded.item_count(), 2);
        assert_eq!(reloaded.groups_of(a), vec![fruit]);
        assert_eq!(reloaded.item(a).unwrap().name, "Apples");
    }

    #[test]
    fn loading_normalizes_hand_edited_files() {
        let raw = r##"{
            "next_item_id": 1,
            "items": [
                {"id": 5, "name": "First", "count": 1},
                {"id": 5, "name": "Duplicate", "count": 9}
            ],
            "groups": [{"id": 2, "name": "G", "color": "#FFFFFF"}],
            "memberships": [{"item": 5, "group": 2}, {"item": 6, "group": 2}]
        }"##;
        let mut store: Store = serde_json::from_str(raw).unwrap();

        assert_eq!(store.item_count(), 1);
        assert_eq!(store.item(ItemId(5)).unwrap().name, "First");
        assert_eq!(store.members_of(GroupId(2)), vec![ItemId(5)]);

        // Counters are raised above ids already in use
        assert_eq!(store.insert_item("next".into(), 0).unwrap().id, ItemId(6));
        assert_eq!(store.insert_group("H".into(), "#000000".into()).unwrap().id, GroupId(3));
    }

    #[test]
    fn loading_an_id_at_the_ceiling_does_not_overflow() {
        let raw = r#"{"next_item_id":1,"items":[{"id":4294967295,"name":"x","count":0}]}"#;
        let mut store: Store = serde_json::from_str(raw).unwrap();

        assert_eq!(store.item(ItemId(u32::MAX)).unwrap().name, "x");
        assert!(store.insert_item("y".into(), 0).is_none());
        assert_eq!(store.item_count(), 1);
        assert_eq!(store.item(ItemId(u32::MAX)).unwrap().name, "x");

        // Groups have their own counter and still work
        assert_eq!(store.insert_group("G".into(), "#000000".into()).unwrap().id, GroupId(1));
    }
}
