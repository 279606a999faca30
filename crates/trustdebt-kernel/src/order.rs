//! ShortLex ordering over hierarchical category keys.
//!
//! Keys compare code point by code point across their common prefix. When
//! the common prefix is equal, the shorter key sorts first. A parent key is
//! therefore always less than any key formed by appending a suffix to it,
//! and siblings compare by their suffix:
//!
//! ```text
//! A  <  A.1  <  A.1.a  <  A.2  <  B
//! ```
//!
//! This order is the canonical row/column order of every matrix.

use std::cmp::Ordering;

/// Separator inserted between a parent key and a child's own segment.
pub const KEY_SEPARATOR: char = '.';

/// Total order over category keys.
pub fn shortlex_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars();
    let mut right = b.chars();
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

/// Whether `child` is `parent` with a non-empty suffix appended.
pub fn extends(child: &str, parent: &str) -> bool {
    child.len() > parent.len() && child.starts_with(parent)
}

/// Key for a child segment under `parent_key`.
///
/// Hierarchical ids that already extend the parent key (`A` → `A.1`) are
/// used as-is; flat ids get the parent key and separator prepended.
pub fn child_key(parent_key: &str, child_id: &str) -> String {
    if extends(child_id, parent_key) {
        child_id.to_string()
    } else {
        format!("{parent_key}{KEY_SEPARATOR}{child_id}")
    }
}
