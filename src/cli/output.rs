use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::store::Store;
use crate::model::{Group, GroupId, Heading, Item, ItemId};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::projection::{GroupSummary, Projection};
use crate::ops::search::{HitTarget, SearchHit, highlight};
use crate::util::unicode::{display_width, pad_to_width, truncate_to_width};

/// Names longer than this are truncated in list output.
const MAX_NAME_WIDTH: usize = 40;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: ItemId,
    pub name: String,
    pub count: i64,
    pub groups: Vec<String>,
}

#[derive(Serialize)]
pub struct GroupJson {
    pub id: GroupId,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

#[derive(Serialize)]
pub struct SectionJson {
    pub heading: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupJson>,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ProjectionJson {
    Flat { items: Vec<ItemJson> },
    Grouped { sections: Vec<SectionJson> },
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub kind: &'static str,
    pub id: u32,
    pub name: String,
    pub spans: Vec<[usize; 2]>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn group_names(store: &Store, item: ItemId) -> Vec<String> {
    store
        .groups_of(item)
        .into_iter()
        .filter_map(|id| store.group(id))
        .map(|g| g.name.clone())
        .collect()
}

pub fn item_to_json(store: &Store, item: &Item) -> ItemJson {
    ItemJson {
        id: item.id,
        name: item.name.clone(),
        count: item.count,
        groups: group_names(store, item.id),
    }
}

pub fn group_to_json(group: &Group, summary: Option<&GroupSummary>) -> GroupJson {
    GroupJson {
        id: group.id,
        name: group.name.clone(),
        color: group.color.clone(),
        members: summary.map(|s| s.members),
        total: summary.map(|s| s.total),
    }
}

fn items_to_json(store: &Store, ids: &[ItemId]) -> Vec<ItemJson> {
    ids.iter()
        .filter_map(|id| store.item(*id))
        .map(|item| item_to_json(store, item))
        .collect()
}

pub fn projection_to_json(store: &Store, projection: &Projection) -> ProjectionJson {
    match projection {
        Projection::Flat(ids) => ProjectionJson::Flat {
            items: items_to_json(store, ids),
        },
        Projection::Grouped(sections) => ProjectionJson::Grouped {
            sections: sections
                .iter()
                .map(|section| {
                    let group = section.heading.group_id().and_then(|id| store.group(id));
                    SectionJson {
                        heading: heading_name(store, section.heading),
                        group: group.map(|g| group_to_json(g, None)),
                        items: items_to_json(store, &section.items),
                    }
                })
                .collect(),
        },
    }
}

pub fn search_hit_to_json(store: &Store, hit: &SearchHit) -> SearchHitJson {
    let (kind, id, name) = match hit.target {
        HitTarget::Item(id) => ("item", id.0, store.item(id).map(|i| i.name.clone())),
        HitTarget::Group(id) => ("group", id.0, store.group(id).map(|g| g.name.clone())),
    };
    SearchHitJson {
        kind,
        id,
        name: name.unwrap_or_default(),
        spans: hit.spans.iter().map(|s| [s.start, s.end]).collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn heading_name(store: &Store, heading: Heading) -> String {
    match heading {
        Heading::Group(id) => store
            .group(id)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| format!("#{id}")),
        Heading::Ungrouped => Heading::UNGROUPED_NAME.to_string(),
    }
}

/// Column width that fits every item name, capped at `MAX_NAME_WIDTH`.
fn name_width<'a>(items: impl Iterator<Item = &'a Item>) -> usize {
    items
        .map(|item| display_width(&item.name))
        .max()
        .unwrap_or(0)
        .min(MAX_NAME_WIDTH)
}

/// `#<id>  <name padded>  <count>`
pub fn format_item_line(item: &Item, width: usize) -> String {
    let name = truncate_to_width(&item.name, width);
    format!("{:>4}  {}  {:>5}", format!("#{}", item.id), pad_to_width(&name, width), item.count)
}

/// Render a projection. Grouped output puts each heading over its items
/// with a blank line between sections.
pub fn format_projection(store: &Store, projection: &Projection) -> Vec<String> {
    let rows = projection.rows();
    let width = name_width(rows.iter().filter_map(|id| store.item(*id)));
    let line = |id: &ItemId| store.item(*id).map(|item| format_item_line(item, width));

    match projection {
        Projection::Flat(ids) => ids.iter().filter_map(line).collect(),
        Projection::Grouped(sections) => {
            let mut lines = Vec::new();
            for (i, section) in sections.iter().enumerate() {
                if i > 0 {
                    lines.push(String::new());
                }
                lines.push(format_heading(store, section.heading));
                lines.extend(section.items.iter().filter_map(line));
            }
            lines
        }
    }
}

fn format_heading(store: &Store, heading: Heading) -> String {
    match heading.group_id().and_then(|id| store.group(id)) {
        Some(group) => format!("== {} ({}) ==", group.name, group.color),
        None => format!("== {} ==", heading_name(store, heading)),
    }
}

pub fn format_item_detail(store: &Store, item: &Item) -> Vec<String> {
    let mut lines = vec![format!("{} (#{})", item.name, item.id), format!("count: {}", item.count)];
    let groups = group_names(store, item.id);
    if groups.is_empty() {
        lines.push(format!("groups: ({})", Heading::UNGROUPED_NAME.to_lowercase()));
    } else {
        lines.push(format!("groups: {}", groups.join(", ")));
    }
    lines
}

/// `#<id>  <name padded>  <color>  <n> items, total <t>`
pub fn format_group_lines(store: &Store, summaries: &[GroupSummary]) -> Vec<String> {
    let groups: Vec<(&Group, &GroupSummary)> = summaries
        .iter()
        .filter_map(|s| store.group(s.group).map(|g| (g, s)))
        .collect();
    let width = groups
        .iter()
        .map(|(g, _)| display_width(&g.name))
        .max()
        .unwrap_or(0)
        .min(MAX_NAME_WIDTH);

    groups
        .into_iter()
        .map(|(group, summary)| {
            let noun = if summary.members == 1 { "item" } else { "items" };
            format!(
                "{:>4}  {}  {:<9}  {} {}, total {}",
                format!("#{}", group.id),
                pad_to_width(&truncate_to_width(&group.name, width), width),
                group.color,
                summary.members,
                noun,
                summary.total,
            )
        })
        .collect()
}

pub fn format_search_hit(store: &Store, hit: &SearchHit) -> Option<String> {
    let (prefix, name) = match hit.target {
        HitTarget::Item(id) => (format!("item #{id}"), &store.item(id)?.name),
        HitTarget::Group(id) => (format!("group #{id}"), &store.group(id)?.name),
    };
    Some(format!("{prefix}  {}", highlight(name, &hit.spans, "[", "]")))
}

pub fn format_check_result(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        lines.extend(result.errors.iter().map(|e| format!("  {}", describe_error(e))));
    }
    if !result.warnings.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        lines.extend(result.warnings.iter().map(|w| format!("  {}", describe_warning(w))));
    }
    lines.push(if result.valid {
        "✓ store is valid".to_string()
    } else {
        "✗ store has errors".to_string()
    });
    lines
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(|id| format!("#{id}")).collect::<Vec<_>>().join(", ")
}

fn describe_error(error: &CheckError) -> String {
    match error {
        CheckError::DuplicateItemId { id, names } => {
            format!("item id {id} is used {} times: {}", names.len(), names.join(", "))
        }
        CheckError::DuplicateGroupId { id, names } => {
            format!("group id {id} is used {} times: {}", names.len(), names.join(", "))
        }
        CheckError::DuplicateGroupName { name, ids } => {
            format!("group name \"{name}\" is shared by {}", join_ids(ids))
        }
        CheckError::DanglingMembership { item, group } => {
            format!("membership of item #{item} in group #{group} points at a missing entity")
        }
        CheckError::StaleItemCounter { next_id, max_id } => {
            format!("next_item_id is {next_id} but item #{max_id} exists")
        }
        CheckError::StaleGroupCounter { next_id, max_id } => {
            format!("next_group_id is {next_id} but group #{max_id} exists")
        }
    }
}

fn describe_warning(warning: &CheckWarning) -> String {
    match warning {
        CheckWarning::InvalidColor { group, color } => {
            format!("group #{group} has an invalid color: \"{color}\"")
        }
        CheckWarning::DuplicateColor { color, groups } => {
            format!("color {color} is shared by {}", join_ids(groups))
        }
        CheckWarning::NegativeCount { item, count } => {
            format!("item #{item} has a negative count: {count}")
        }
        CheckWarning::EmptyItemName { item } => format!("item #{item} has an empty name"),
        CheckWarning::EmptyGroupName { group } => format!("group #{group} has an empty name"),
        CheckWarning::DuplicateMembership { item, group } => {
            format!("item #{item} is listed in group #{group} more than once")
        }
        CheckWarning::UnknownVersion { version } => {
            format!("store version {version} is not recognized")
        }
        CheckWarning::IdsExhausted { kind } => {
            format!("every {kind} id is used; no new {kind}s can be created")
        }
    }
}

/// One-line summary of a recovery entry
pub fn format_recovery_entry(entry: &RecoveryEntry) -> String {
    format!(
        "{}  {:<6}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.category.to_string(),
        entry.description
    )
}
