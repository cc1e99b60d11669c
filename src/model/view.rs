use std::fmt;

use serde::{Deserialize, Serialize};

use super::group::GroupId;

/// Which field the projection sorts by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Count,
}

impl SortKey {
    pub fn parse_key(s: &str) -> Option<SortKey> {
        match s.trim().to_lowercase().as_str() {
            "name" => Some(SortKey::Name),
            "count" => Some(SortKey::Count),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Count => "count",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse_direction(s: &str) -> Option<SortDirection> {
        match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Some(SortDirection::Ascending),
            "descending" | "desc" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    pub fn toggle(&mut self) {
        *self = match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        };
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the projection needs besides the entities themselves.
///
/// A plain value: two configs are equal when every field is equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Case-insensitive substring filter on item names (empty = no filter)
    pub search_text: String,
    pub sort_key: SortKey,
    pub direction: SortDirection,
    /// Only show members of this group. Disables grouping.
    pub group_filter: Option<GroupId>,
    /// Partition the result under group headings
    pub grouped: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            search_text: String::new(),
            sort_key: SortKey::default(),
            direction: SortDirection::default(),
            group_filter: None,
            grouped: true,
        }
    }
}
