//! The view pipeline: filter → sort → (optionally) group.
//!
//! `project` is a pure function of the store and a `ViewConfig`. It is cheap
//! over the small, hand-entered data sets this tool deals with, so callers
//! simply recompute it after every change instead of caching.

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::store::Store;
use crate::model::{GroupId, Heading, Item, ItemId, SortDirection, SortKey, ViewConfig};

/// The ordered (and possibly grouped) list of items a view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "layout", content = "content")]
pub enum Projection {
    Flat(Vec<ItemId>),
    Grouped(Vec<Section>),
}

/// One heading of a grouped projection and the items under it, in sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: Heading,
    pub items: Vec<ItemId>,
}

impl Projection {
    /// Every row in display order. An item in several groups appears once
    /// per heading.
    pub fn rows(&self) -> Vec<ItemId> {
        match self {
            Projection::Flat(items) => items.clone(),
            Projection::Grouped(sections) => sections
                .iter()
                .flat_map(|s| s.items.iter().copied())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Projection::Flat(items) => items.is_empty(),
            Projection::Grouped(sections) => sections.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Compute the projection for `config`.
///
/// 1. Filter: keep items in `group_filter` (if set) whose name contains
///    `search_text`, ignoring case.
/// 2. Sort: stable, by name (ordinal, case-sensitive) or by count; descending
///    reverses the comparator.
/// 3. Group: only when `grouped` and no group filter. Items appear under
///    every group they belong to; items without groups go under Ungrouped,
///    which comes after all named headings.
pub fn project(store: &Store, config: &ViewConfig) -> Projection {
    let filter = NameFilter::new(&config.search_text);
    let mut items: Vec<&Item> = store
        .items()
        .filter(|item| {
            config
                .group_filter
                .is_none_or(|group| store.is_member(item.id, group))
                && filter.matches(&item.name)
        })
        .collect();

    sort_items(&mut items, config.sort_key, config.direction);

    if config.grouped && config.group_filter.is_none() {
        Projection::Grouped(group_sections(store, &items))
    } else {
        Projection::Flat(items.iter().map(|item| item.id).collect())
    }
}

/// Case-insensitive substring match on item names. Empty matches everything.
#[derive(Debug, Clone)]
pub struct NameFilter {
    needle: String,
}

impl NameFilter {
    pub fn new(search_text: &str) -> Self {
        NameFilter {
            needle: search_text.to_lowercase(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.needle.is_empty() || name.to_lowercase().contains(&self.needle)
    }
}

/// Stable sort with no secondary key: equal items keep their store order.
pub fn sort_items(items: &mut [&Item], key: SortKey, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

fn compare(a: &Item, b: &Item, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Count => a.count.cmp(&b.count),
    }
}

fn group_sections(store: &Store, items: &[&Item]) -> Vec<Section> {
    let mut groups: Vec<_> = store.groups().collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let mut sections: Vec<Section> = groups
        .into_iter()
        .map(|group| Section {
            heading: Heading::Group(group.id),
            items: items
                .iter()
                .filter(|item| store.is_member(item.id, group.id))
                .map(|item| item.id)
                .collect(),
        })
        .filter(|section| !section.items.is_empty())
        .collect();

    let ungrouped: Vec<ItemId> = items
        .iter()
        .filter(|item| store.groups_of(item.id).is_empty())
        .map(|item| item.id)
        .collect();
    if !ungrouped.is_empty() {
        sections.push(Section {
            heading: Heading::Ungrouped,
            items: ungrouped,
        });
    }
    sections
}

// ---------------------------------------------------------------------------
// Group statistics
// ---------------------------------------------------------------------------

/// Member count and summed counts for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group: GroupId,
    pub members: usize,
    pub total: i64,
}

/// Summaries for every group, ordered by group name.
pub fn group_summaries(store: &Store) -> Vec<GroupSummary> {
    let mut groups: Vec<_> = store.groups().collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    groups
        .into_iter()
        .map(|group| {
            let members = store.members_of(group.id);
            let total = members
                .iter()
                .filter_map(|id| store.item(*id))
                .fold(0i64, |acc, item| acc.saturating_add(item.count));
            GroupSummary {
                group: group.id,
                members: members.len(),
                total,
            }
        })
        .collect()
}

/// Items that belong to no group, in store order.
pub fn ungrouped_items(store: &Store) -> Vec<ItemId> {
    store
        .items()
        .filter(|item| store.groups_of(item.id).is_empty())
        .map(|item| item.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(store: &Store, ids: &[ItemId]) -> Vec<String> {
        ids.iter()
            .map(|id| store.item(*id).unwrap().name.clone())
            .collect()
    }

    fn flat(config: ViewConfig) -> ViewConfig {
        ViewConfig {
            grouped: false,
            ..config
        }
    }

    fn store_with(names_counts: &[(&str, i64)]) -> Store {
        let mut store = Store::new();
        for (name, count) in names_counts {
            store.insert_item(name.to_string(), *count).unwrap();
        }
        store
    }

    #[test]
    fn name_sort_is_case_sensitive_ordinal() {
        let store = store_with(&[("Banana", 0), ("apple", 0), ("Cherry", 0)]);
        let result = project(&store, &flat(ViewConfig::default()));
        assert_eq!(names(&store, &result.rows()), vec!["Banana", "Cherry", "apple"]);
    }

    #[test]
    fn descending_reverses_the_comparator() {
        let store = store_with(&[("b", 2), ("a", 9), ("c", 5)]);
        let config = flat(ViewConfig {
            sort_key: SortKey::Count,
            direction: SortDirection::Descending,
            ..ViewConfig::default()
        });
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["a", "c", "b"]);

        let config = flat(ViewConfig {
            direction: SortDirection::Descending,
            ..ViewConfig::default()
        });
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["c", "b", "a"]);
    }

    #[test]
    fn equal_keys_keep_store_order_in_both_directions() {
        let store = store_with(&[("first", 1), ("second", 1), ("third", 0), ("fourth", 1)]);
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let config = flat(ViewConfig {
                sort_key: SortKey::Count,
                direction,
                ..ViewConfig::default()
            });
            let ones: Vec<String> = names(&store, &project(&store, &config).rows())
                .into_iter()
                .filter(|n| n != "third")
                .collect();
            assert_eq!(ones, vec!["first", "second", "fourth"]);
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = store_with(&[("Item 1", 0), ("Item 2", 0), ("Other", 0)]);
        let config = flat(ViewConfig {
            search_text: "ite".into(),
            ..ViewConfig::default()
        });
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["Item 1", "Item 2"]);

        let config = flat(ViewConfig {
            search_text: "OTH".into(),
            ..ViewConfig::default()
        });
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["Other"]);
    }

    #[test]
    fn group_filter_yields_flat_members_only() {
        let mut store = store_with(&[("a", 0), ("b", 0), ("c", 0)]);
        let g = store.insert_group("G".into(), "#FF5733".into()).unwrap().id;
        store.link(ItemId(1), g);
        store.link(ItemId(3), g);

        let config = ViewConfig {
            group_filter: Some(g),
            ..ViewConfig::default()
        };
        let result = project(&store, &config);
        assert_eq!(result, Projection::Flat(vec![ItemId(1), ItemId(3)]));
    }

    #[test]
    fn group_filter_and_search_combine() {
        let mut store = store_with(&[("apple", 0), ("avocado", 0), ("banana", 0)]);
        let g = store.insert_group("Fruit".into(), "#FF5733".into()).unwrap().id;
        store.link(ItemId(1), g);
        store.link(ItemId(3), g);

        let config = ViewConfig {
            group_filter: Some(g),
            search_text: "A".into(),
            ..ViewConfig::default()
        };
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["apple", "banana"]);
    }

    #[test]
    fn multi_group_items_appear_under_each_heading_and_not_ungrouped() {
        let mut store = store_with(&[("Both", 1), ("Solo", 2), ("None", 3)]);
        let work = store.insert_group("Work".into(), "#FF5733".into()).unwrap().id;
        let home = store.insert_group("Home".into(), "#33FF57".into()).unwrap().id;
        store.link(ItemId(1), work);
        store.link(ItemId(1), home);
        store.link(ItemId(2), work);

        let result = project(&store, &ViewConfig::default());
        assert_eq!(
            result,
            Projection::Grouped(vec![
                Section {
                    heading: Heading::Group(home),
                    items: vec![ItemId(1)],
                },
                Section {
                    heading: Heading::Group(work),
                    items: vec![ItemId(1), ItemId(2)],
                },
                Section {
                    heading: Heading::Ungrouped,
                    items: vec![ItemId(3)],
                },
            ])
        );
    }

    #[test]
    fn empty_headings_are_omitted() {
        let mut store = store_with(&[("x", 0)]);
        store.insert_group("Unused".into(), "#FF5733".into()).unwrap();
        let result = project(&store, &ViewConfig::default());
        assert_eq!(
            result,
            Projection::Grouped(vec![Section {
                heading: Heading::Ungrouped,
                items: vec![ItemId(1)],
            }])
        );
    }

    #[test]
    fn sections_follow_the_sort_order() {
        let mut store = store_with(&[("low", 1), ("high", 9), ("mid", 5)]);
        let g = store.insert_group("G".into(), "#FF5733".into()).unwrap().id;
        for id in [ItemId(1), ItemId(2), ItemId(3)] {
            store.link(id, g);
        }
        let config = ViewConfig {
            sort_key: SortKey::Count,
            direction: SortDirection::Descending,
            ..ViewConfig::default()
        };
        assert_eq!(names(&store, &project(&store, &config).rows()), vec!["high", "mid", "low"]);
    }

    #[test]
    fn projection_is_idempotent() {
        let mut store = store_with(&[("b", 1), ("a", 2), ("c", 2)]);
        let g = store.insert_group("G".into(), "#FF5733".into()).unwrap().id;
        store.link(ItemId(2), g);
        let config = ViewConfig {
            sort_key: SortKey::Count,
            search_text: "".into(),
            ..ViewConfig::default()
        };
        assert_eq!(project(&store, &config), project(&store, &config));
    }

    #[test]
    fn empty_store_projects_to_empty() {
        let store = Store::new();
        assert!(project(&store, &ViewConfig::default()).is_empty());
        assert!(project(&store, &flat(ViewConfig::default())).is_empty());
    }

    #[test]
    fn summaries_count_members_and_totals() {
        let mut store = store_with(&[("a", 2), ("b", 5), ("c", 7)]);
        let z = store.insert_group("Zed".into(), "#FF5733".into()).unwrap().id;
        let a = store.insert_group("Able".into(), "#33FF57".into()).unwrap().id;
        store.link(ItemId(1), z);
        store.link(ItemId(2), z);

        assert_eq!(
            group_summaries(&store),
            vec![
                GroupSummary { group: a, members: 0, total: 0 },
                GroupSummary { group: z, members: 2, total: 7 },
            ]
        );
        assert_eq!(ungrouped_items(&store), vec![ItemId(3)]);
    }

    #[test]
    fn summary_totals_saturate_instead_of_overflowing() {
        let mut store = store_with(&[("a", i64::MAX), ("b", i64::MAX)]);
        let g = store.insert_group("Big".into(), "#FF5733".into()).unwrap().id;
        store.link(ItemId(1), g);
        store.link(ItemId(2), g);

        assert_eq!(
            group_summaries(&store),
            vec![GroupSummary { group: g, members: 2, total: i64::MAX }]
        );
    }
}
