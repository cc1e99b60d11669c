use serde::{Deserialize, Serialize};

use super::view::{SortDirection, SortKey, ViewConfig};

/// Configuration from tally.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    pub workspace: WorkspaceInfo,
    #[serde(default)]
    pub view: ViewDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub name: String,
}

/// View settings used by `tl list` and `tl watch` when no flag overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefaults {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "default_true")]
    pub grouped: bool,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        ViewDefaults {
            sort: SortKey::Name,
            direction: SortDirection::Ascending,
            grouped: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ViewDefaults {
    /// A view config seeded from these defaults (no search, no group filter).
    pub fn to_view_config(&self) -> ViewConfig {
        ViewConfig {
            sort_key: self.sort,
            direction: self.direction,
            grouped: self.grouped,
            ..ViewConfig::default()
        }
    }
}
