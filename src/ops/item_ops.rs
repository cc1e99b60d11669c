use super::{EntityKind, OpError};
use crate::model::store::Store;
use crate::model::{Item, ItemId};

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

/// Create an item. The name is trimmed and must be non-empty; the initial
/// count must not be negative.
pub fn create_item(store: &mut Store, name: &str, count: i64) -> Result<Item, OpError> {
    let name = validate_item_name(name)?;
    if count < 0 {
        return Err(OpError::NegativeCount(count));
    }
    store
        .insert_item(name, count)
        .cloned()
        .ok_or(OpError::IdsExhausted(EntityKind::Item))
}

pub fn rename_item(store: &mut Store, id: ItemId, name: &str) -> Result<Item, OpError> {
    let name = validate_item_name(name)?;
    let item = store.item_mut(id).ok_or(OpError::ItemNotFound(id))?;
    item.name = name;
    Ok(item.clone())
}

/// Delete an item, removing it from every group.
pub fn delete_item(store: &mut Store, id: ItemId) -> Result<Item, OpError> {
    store.remove_item(id).ok_or(OpError::ItemNotFound(id))
}

pub fn validate_item_name(name: &str) -> Result<String, OpError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OpError::EmptyName(EntityKind::Item));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Add one to the count. Returns the new count.
pub fn increment(store: &mut Store, id: ItemId) -> Result<i64, OpError> {
    let item = store.item_mut(id).ok_or(OpError::ItemNotFound(id))?;
    item.count = item.count.saturating_add(1);
    Ok(item.count)
}

/// Subtract one from the count, never going below zero.
/// Returns false (and changes nothing) when the count is already zero.
pub fn decrement(store: &mut Store, id: ItemId) -> Result<bool, OpError> {
    let item = store.item_mut(id).ok_or(OpError::ItemNotFound(id))?;
    if item.count <= 0 {
        return Ok(false);
    }
    item.count -= 1;
    Ok(true)
}

/// Set the count directly. Returns whether the value changed.
pub fn set_count(store: &mut Store, id: ItemId, count: i64) -> Result<bool, OpError> {
    if count < 0 {
        return Err(OpError::NegativeCount(count));
    }
    let item = store.item_mut(id).ok_or(OpError::ItemNotFound(id))?;
    if item.count == count {
        return Ok(false);
    }
    item.count = count;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_and_validates() {
        let mut store = Store::new();
        let item = create_item(&mut store, "  Push-ups ", 5).unwrap();
        assert_eq!(item.name, "Push-ups");
        assert_eq!(item.count, 5);

        assert_eq!(
            create_item(&mut store, "   ", 0).unwrap_err(),
            OpError::EmptyName(EntityKind::Item)
        );
        assert_eq!(
            create_item(&mut store, "Sit-ups", -1).unwrap_err(),
            OpError::NegativeCount(-1)
        );
        assert_eq!(store.item_count(), 1);
    }

    #[test]
    fn duplicate_item_names_are_allowed() {
        let mut store = Store::new();
        let a = create_item(&mut store, "Coffee", 0).unwrap();
        let b = create_item(&mut store, "Coffee", 0).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn rename_rejects_blank_and_keeps_old_name() {
        let mut store = Store::new();
        let item = create_item(&mut store, "Coffee", 0).unwrap();
        assert!(rename_item(&mut store, item.id, " ").is_err());
        assert_eq!(store.item(item.id).unwrap().name, "Coffee");

        let renamed = rename_item(&mut store, item.id, "Tea").unwrap();
        assert_eq!(renamed.name, "Tea");
    }

    #[test]
    fn increment_and_decrement() {
        let mut store = Store::new();
        let id = create_item(&mut store, "Laps", 0).unwrap().id;
        assert_eq!(increment(&mut store, id).unwrap(), 1);
        assert_eq!(increment(&mut store, id).unwrap(), 2);
        assert!(decrement(&mut store, id).unwrap());
        assert_eq!(store.item(id).unwrap().count, 1);
    }

    #[test]
    fn decrement_at_zero_is_a_no_op() {
        let mut store = Store::new();
        let id = create_item(&mut store, "Laps", 0).unwrap().id;
        assert!(!decrement(&mut store, id).unwrap());
        assert_eq!(store.item(id).unwrap().count, 0);
    }

    #[test]
    fn set_count_rejects_negative_values() {
        let mut store = Store::new();
        let id = create_item(&mut store, "Laps", 3).unwrap().id;
        assert_eq!(set_count(&mut store, id, -4).unwrap_err(), OpError::NegativeCount(-4));
        assert!(!set_count(&mut store, id, 3).unwrap());
        assert!(set_count(&mut store, id, 10).unwrap());
        assert_eq!(store.item(id).unwrap().count, 10);
    }

    #[test]
    fn missing_items_are_reported() {
        let mut store = Store::new();
        let missing = ItemId(12);
        assert_eq!(increment(&mut store, missing).unwrap_err(), OpError::ItemNotFound(missing));
        assert_eq!(decrement(&mut store, missing).unwrap_err(), OpError::ItemNotFound(missing));
        assert_eq!(delete_item(&mut store, missing).unwrap_err(), OpError::ItemNotFound(missing));
    }

    #[test]
    fn exhausted_ids_are_an_error() {
        let raw = r#"{"next_item_id":1,"items":[{"id":4294967295,"name":"x","count":0}]}"#;
        let mut store: Store = serde_json::from_str(raw).unwrap();
        assert_eq!(
            create_item(&mut store, "y", 0).unwrap_err(),
            OpError::IdsExhausted(EntityKind::Item)
        );
        assert_eq!(store.item_count(), 1);
    }
}
