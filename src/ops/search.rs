use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::model::store::Store;
use crate::model::{GroupId, ItemId};

/// What a search hit points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum HitTarget {
    Item(ItemId),
    Group(GroupId),
}

/// A name that matched, with the byte ranges of every match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub target: HitTarget,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search item names, then group names, in store order.
pub fn search_store(store: &Store, re: &Regex) -> Vec<SearchHit> {
    let items = store.items().filter_map(|item| {
        let spans = find_matches(re, &item.name);
        (!spans.is_empty()).then_some(SearchHit {
            target: HitTarget::Item(item.id),
            spans,
        })
    });
    let groups = store.groups().filter_map(|group| {
        let spans = find_matches(re, &group.name);
        (!spans.is_empty()).then_some(SearchHit {
            target: HitTarget::Group(group.id),
            spans,
        })
    });
    items.chain(groups).collect()
}

/// Wrap each matched span of `text` in `open`/`close` markers.
pub fn highlight(text: &str, spans: &[Range<usize>], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        out.push_str(&text[last..span.start]);
        out.push_str(open);
        out.push_str(&text[span.clone()]);
        out.push_str(close);
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}
