//! core::hierarchy
//!
//! Hierarchical identifier helpers.
//!
//! A hierarchical id is a root id followed by one or more `.N` segments,
//! where each `N` is a child ordinal: `bd-a3f8.1.2` is the second child of
//! the first child of `bd-a3f8`. Hierarchy is independent of prefix routing.
//!
//! # Example
//!
//! ```
//! use rigwork::core::hierarchy::{child_id, parse_hierarchical_id, root_parent_id};
//!
//! let child = child_id("bd-a3f8", 1);
//! assert_eq!(child, "bd-a3f8.1");
//! assert_eq!(parse_hierarchical_id(&child), Some(("bd-a3f8", 1)));
//! assert_eq!(root_parent_id("bd-a3f8.1.2"), "bd-a3f8");
//! ```

use super::ids::IdError;

/// Default maximum hierarchy depth for child creation.
pub const DEFAULT_MAX_DEPTH: usize = 3;

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// True iff the segment after the last dot is a child number: non-empty,
/// all digits and within `u64`.
pub fn is_hierarchical_id(id: &str) -> bool {
    parse_hierarchical_id(id).is_some()
}

/// Substring before the first dot, or the whole id.
pub fn root_parent_id(id: &str) -> &str {
    match id.find('.') {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// Split into `(immediate_parent, child_number)` on the last dot.
///
/// Returns `None` unless the trailing segment is a non-empty number that
/// fits in `u64`.
pub fn parse_hierarchical_id(id: &str) -> Option<(&str, u64)> {
    let pos = id.rfind('.')?;
    let segment = &id[pos + 1..];
    if !is_numeric(segment) {
        return None;
    }
    let number = segment.parse().ok()?;
    Some((&id[..pos], number))
}

/// Number of `.` separators in `id`.
///
/// This is a structural count: trailing segments need not be numeric, so
/// `"my.project-abc"` reports depth 1.
pub fn hierarchy_depth(id: &str) -> usize {
    id.matches('.').count()
}

/// Build the id of child `child_number` under `parent_id`.
pub fn child_id(parent_id: &str, child_number: u64) -> String {
    format!("{parent_id}.{child_number}")
}

/// Compose an id prefix from a base and an optional addition.
///
/// `base` is normalized to end with exactly one hyphen. A non-empty
/// `addition` has its own leading and trailing hyphens stripped and is
/// inserted before the final hyphen.
///
/// # Example
///
/// ```
/// use rigwork::core::hierarchy::build_prefix;
///
/// assert_eq!(build_prefix("bd", ""), "bd-");
/// assert_eq!(build_prefix("bd--", ""), "bd-");
/// assert_eq!(build_prefix("bd", "mol"), "bd-mol-");
/// assert_eq!(build_prefix("bd-", "-mol-"), "bd-mol-");
/// ```
pub fn build_prefix(base: &str, addition: &str) -> String {
    let base = base.trim_end_matches('-');
    let addition = addition.trim_matches('-');
    if addition.is_empty() {
        format!("{base}-")
    } else {
        format!("{base}-{addition}-")
    }
}

/// Check that a child may be created under `parent_id`.
///
/// # Errors
///
/// Returns [`IdError::MaxDepthExceeded`] iff
/// `hierarchy_depth(parent_id) + 1 > max_depth`.
pub fn check_hierarchy_depth(parent_id: &str, max_depth: usize) -> Result<(), IdError> {
    let depth = hierarchy_depth(parent_id);
    if depth + 1 > max_depth {
        return Err(IdError::MaxDepthExceeded {
            parent: parent_id.to_string(),
            depth,
            max_depth,
        });
    }
    Ok(())
}
