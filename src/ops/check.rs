use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::store::{STORE_VERSION, StoreFile};
use crate::model::{GroupId, ItemId};
use crate::util::color::normalize_hex;

/// Structured result from `tl check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A problem that loading silently repairs by dropping or renumbering data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    #[serde(rename = "duplicate_item_id")]
    DuplicateItemId { id: ItemId, names: Vec<String> },
    #[serde(rename = "duplicate_group_id")]
    DuplicateGroupId { id: GroupId, names: Vec<String> },
    /// Two groups whose names differ only by case or surrounding whitespace
    #[serde(rename = "duplicate_group_name")]
    DuplicateGroupName { name: String, ids: Vec<GroupId> },
    /// A membership row naming an item or group that does not exist
    #[serde(rename = "dangling_membership")]
    DanglingMembership { item: ItemId, group: GroupId },
    /// An id at or above the counter that would hand it out again
    #[serde(rename = "stale_item_counter")]
    StaleItemCounter { next_id: u32, max_id: u32 },
    #[serde(rename = "stale_group_counter")]
    StaleGroupCounter { next_id: u32, max_id: u32 },
}

/// A non-critical issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    #[serde(rename = "invalid_color")]
    InvalidColor { group: GroupId, color: String },
    #[serde(rename = "duplicate_color")]
    DuplicateColor { color: String, groups: Vec<GroupId> },
    #[serde(rename = "negative_count")]
    NegativeCount { item: ItemId, count: i64 },
    #[serde(rename = "empty_item_name")]
    EmptyItemName { item: ItemId },
    #[serde(rename = "empty_group_name")]
    EmptyGroupName { group: GroupId },
    #[serde(rename = "duplicate_membership")]
    DuplicateMembership { item: ItemId, group: GroupId },
    #[serde(rename = "unknown_version")]
    UnknownVersion { version: u32 },
    /// The counter has reached the last id, so nothing more can be created
    #[serde(rename = "ids_exhausted")]
    IdsExhausted { kind: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a raw store file and return structured results.
///
/// Runs on the file as written, before normalization, so it can see what a
/// hand edit broke:
/// 1. Ids are unique and below their counters
/// 2. Membership rows point at existing items and groups
/// 3. Group names are unique ignoring case
/// 4. Warnings for bad or shared colors, negative counts, blank names,
///    repeated membership rows and unknown format versions
pub fn check_store_file(file: &StoreFile) -> CheckResult {
    let mut result = CheckResult::default();

    if file.version != STORE_VERSION {
        result.warnings.push(CheckWarning::UnknownVersion {
            version: file.version,
        });
    }

    check_items(file, &mut result);
    check_groups(file, &mut result);
    check_memberships(file, &mut result);

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Per-table validation
// ---------------------------------------------------------------------------

fn check_items(file: &StoreFile, result: &mut CheckResult) {
    let mut by_id: HashMap<ItemId, Vec<String>> = HashMap::new();
    for item in &file.items {
        by_id.entry(item.id).or_default().push(item.name.clone());
        if item.name.trim().is_empty() {
            result.warnings.push(CheckWarning::EmptyItemName { item: item.id });
        }
        if item.count < 0 {
            result.warnings.push(CheckWarning::NegativeCount {
                item: item.id,
                count: item.count,
            });
        }
    }

    let mut duplicates: Vec<_> = by_id.into_iter().filter(|(_, n)| n.len() > 1).collect();
    duplicates.sort_by_key(|(id, _)| *id);
    for (id, names) in duplicates {
        result.errors.push(CheckError::DuplicateItemId { id, names });
    }

    let max_id = file.items.iter().map(|i| i.id.0).max();
    if let Some(max_id) = max_id
        && max_id >= file.next_item_id
    {
        result.errors.push(CheckError::StaleItemCounter {
            next_id: file.next_item_id,
            max_id,
        });
    }
    check_exhausted("item", file.next_item_id, max_id, result);
}

fn check_groups(file: &StoreFile, result: &mut CheckResult) {
    let mut by_id: HashMap<GroupId, Vec<String>> = HashMap::new();
    let mut by_name: Vec<(String, Vec<GroupId>)> = Vec::new();
    let mut by_color: Vec<(String, Vec<GroupId>)> = Vec::new();

    for group in &file.groups {
        by_id.entry(group.id).or_default().push(group.name.clone());

        let key = group.name.trim().to_lowercase();
        if key.is_empty() {
            result.warnings.push(CheckWarning::EmptyGroupName { group: group.id });
        } else {
            push_grouped(&mut by_name, key, group.id);
        }

        match normalize_hex(&group.color) {
            Ok(color) => push_grouped(&mut by_color, color, group.id),
            Err(_) => result.warnings.push(CheckWarning::InvalidColor {
                group: group.id,
                color: group.color.clone(),
            }),
        }
    }

    let mut duplicates: Vec<_> = by_id.into_iter().filter(|(_, n)| n.len() > 1).collect();
    duplicates.sort_by_key(|(id, _)| *id);
    for (id, names) in duplicates {
        result.errors.push(CheckError::DuplicateGroupId { id, names });
    }

    for (name, ids) in by_name.into_iter().filter(|(_, ids)| ids.len() > 1) {
        result.errors.push(CheckError::DuplicateGroupName { name, ids });
    }
    for (color, groups) in by_color.into_iter().filter(|(_, ids)| ids.len() > 1) {
        result.warnings.push(CheckWarning::DuplicateColor { color, groups });
    }

    let max_id = file.groups.iter().map(|g| g.id.0).max();
    if let Some(max_id) = max_id
        && max_id >= file.next_group_id
    {
        result.errors.push(CheckError::StaleGroupCounter {
            next_id: file.next_group_id,
            max_id,
        });
    }
    check_exhausted("group", file.next_group_id, max_id, result);
}

fn check_memberships(file: &StoreFile, result: &mut CheckResult) {
    let items: HashSet<ItemId> = file.items.iter().map(|i| i.id).collect();
    let groups: HashSet<GroupId> = file.groups.iter().map(|g| g.id).collect();
    let mut seen = HashSet::new();

    for row in &file.memberships {
        if !items.contains(&row.item) || !groups.contains(&row.group) {
            result.errors.push(CheckError::DanglingMembership {
                item: row.item,
                group: row.group,
            });
        } else if !seen.insert((row.item, row.group)) {
            result.warnings.push(CheckWarning::DuplicateMembership {
                item: row.item,
                group: row.group,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Warn when the counter a load would settle on is `u32::MAX`, which is
/// never handed out.
fn check_exhausted(kind: &str, next_id: u32, max_id: Option<u32>, result: &mut CheckResult) {
    let effective = next_id.max(max_id.map_or(0, |id| id.saturating_add(1)));
    if effective == u32::MAX {
        result.warnings.push(CheckWarning::IdsExhausted {
            kind: kind.to_string(),
        });
    }
}

/// Append `id` under `key`, keeping keys in first-seen order.
fn push_grouped<T>(buckets: &mut Vec<(String, Vec<T>)>, key: String, id: T) {
    match buckets.iter_mut().find(|(k, _)| *k == key) {
        Some((_, ids)) => ids.push(id),
        None => buckets.push((key, vec![id])),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
