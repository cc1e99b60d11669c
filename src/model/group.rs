use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a group. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, colored label that items can belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Trimmed, unique among all groups (case-insensitive)
    pub name: String,
    /// Canonical hex color, e.g. `#FF5733`
    pub color: String,
}

impl Group {
    pub fn new(id: GroupId, name: String, color: String) -> Self {
        Group { id, name, color }
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Group {}

/// A heading in a grouped projection.
///
/// `Ungrouped` is the bucket for items with no memberships. It is not a
/// persisted group and has no `GroupId`, so it can never be the target of a
/// membership command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Heading {
    Group(GroupId),
    Ungrouped,
}

impl Heading {
    pub const UNGROUPED_NAME: &'static str = "Ungrouped";

    pub fn group_id(self) -> Option<GroupId> {
        match self {
            Heading::Group(id) => Some(id),
            Heading::Ungrouped => None,
        }
    }
}
