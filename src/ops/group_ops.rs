use rand::Rng;

use super::{EntityKind, OpError};
use crate::model::store::{Store, names_match};
use crate::model::{Group, GroupId};
use crate::util::color::{PALETTE, normalize_hex, random_hex_color, same_color};

/// How many random draws to try before accepting a color that is in use.
const RANDOM_COLOR_ATTEMPTS: usize = 64;

// ---------------------------------------------------------------------------
// Create / rename / recolor / delete
// ---------------------------------------------------------------------------

/// Create a group with a validated, unique name and a distinct color.
///
/// `color` is adopted (canonicalized to `#RRGGBB[AA]` uppercase) when it is
/// valid hex and no other group uses it. Otherwise the first unused palette
/// color is assigned, then a random one once the palette is exhausted.
pub fn create_group(
    store: &mut Store,
    name: &str,
    color: Option<&str>,
    rng: &mut impl Rng,
) -> Result<Group, OpError> {
    let name = validate_group_name(store, name, None)?;
    let color = resolve_color(store, color, None, rng);
    store
        .insert_group(name, color)
        .cloned()
        .ok_or(OpError::IdsExhausted(EntityKind::Group))
}

/// Rename a group. The new name is subject to the same checks as creation;
/// changing only the case of a group's own name is allowed.
pub fn rename_group(store: &mut Store, id: GroupId, name: &str) -> Result<Group, OpError> {
    if store.group(id).is_none() {
        return Err(OpError::GroupNotFound(id));
    }
    let name = validate_group_name(store, name, Some(id))?;
    let group = store.group_mut(id).ok_or(OpError::GroupNotFound(id))?;
    group.name = name;
    Ok(group.clone())
}

/// Change a group's color using the same resolution rules as creation.
/// The group's current color does not count as taken. Returns the color that
/// was assigned.
pub fn recolor_group(
    store: &mut Store,
    id: GroupId,
    color: Option<&str>,
    rng: &mut impl Rng,
) -> Result<String, OpError> {
    if store.group(id).is_none() {
        return Err(OpError::GroupNotFound(id));
    }
    let color = resolve_color(store, color, Some(id), rng);
    let group = store.group_mut(id).ok_or(OpError::GroupNotFound(id))?;
    group.color = color.clone();
    Ok(color)
}

/// Delete a group, removing it from every member.
pub fn delete_group(store: &mut Store, id: GroupId) -> Result<Group, OpError> {
    store.remove_group(id).ok_or(OpError::GroupNotFound(id))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Trim `name` and check it is non-empty and unused (case-insensitive).
/// `except` excludes one group from the duplicate check (for renames).
pub fn validate_group_name(
    store: &Store,
    name: &str,
    except: Option<GroupId>,
) -> Result<String, OpError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OpError::EmptyName(EntityKind::Group));
    }
    let taken = store
        .groups()
        .any(|g| Some(g.id) != except && names_match(&g.name, trimmed));
    if taken {
        return Err(OpError::DuplicateName(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Color assignment
// ---------------------------------------------------------------------------

/// Canonical colors currently used by groups other than `except`.
pub fn colors_in_use(store: &Store, except: Option<GroupId>) -> Vec<String> {
    store
        .groups()
        .filter(|g| Some(g.id) != except)
        .filter_map(|g| normalize_hex(&g.color).ok())
        .collect()
}

/// Pick the color a group should get. An invalid or taken `requested` color
/// falls back silently to the palette.
pub fn resolve_color(
    store: &Store,
    requested: Option<&str>,
    except: Option<GroupId>,
    rng: &mut impl Rng,
) -> String {
    let in_use = colors_in_use(store, except);
    if let Some(requested) = requested
        && let Ok(color) = normalize_hex(requested)
        && !is_taken(&in_use, &color)
    {
        return color;
    }
    next_free_color(&in_use, rng)
}

fn is_taken(in_use: &[String], color: &str) -> bool {
    in_use.iter().any(|used| same_color(used, color))
}

/// First palette color not in `in_use`, else a random color (retrying a
/// bounded number of times to avoid collisions). Entries in `in_use` need not
/// be canonical.
pub fn next_free_color(in_use: &[String], rng: &mut impl Rng) -> String {
    if let Some(color) = PALETTE.iter().find(|c| !is_taken(in_use, c)) {
        return color.to_string();
    }
    let mut color = random_hex_color(rng);
    for _ in 1..RANDOM_COLOR_ATTEMPTS {
        if !is_taken(in_use, &color) {
            break;
        }
        color = random_hex_color(rng);
    }
    color
}
