pub mod check;
pub mod group_ops;
pub mod item_ops;
pub mod membership;
pub mod projection;
pub mod search;

use std::fmt;

use crate::model::{GroupId, ItemId};

/// Which kind of entity a validation error is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Item,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Item => write!(f, "item"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

/// Error type for store operations.
///
/// Every variant is raised before the working set is touched, so a failed
/// operation never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    #[error("{0} name cannot be empty")]
    EmptyName(EntityKind),
    #[error("a group named \"{0}\" already exists")]
    DuplicateName(String),
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),
    #[error("count cannot be negative: {0}")]
    NegativeCount(i64),
    #[error("no {0} ids left: the store has used every id")]
    IdsExhausted(EntityKind),
}
