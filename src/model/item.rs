use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a counted item. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named counter.
///
/// Group membership is not stored here; it lives in the store's relation
/// table and is reached through `Store::groups_of`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub count: i64,
}

impl Item {
    pub fn new(id: ItemId, name: String, count: i64) -> Self {
        Item { id, name, count }
    }
}

/// Items compare by identity, not by their current name or count.
impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}
