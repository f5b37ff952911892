//! Paginated, sortable key search for operational introspection.
//!
//! Read-only: enumerates the store's key space under a prefix, filters by a
//! keyword, sorts, and slices. Repeated calls over an unchanged store return
//! the same sequence.

use crate::contract::{SharedStore, StoreResult};

/// Search keys under `prefix` whose suffix contains `keyword`.
///
/// `start` is the offset into the sorted match list; `count = -1` takes
/// everything to the end. `ascending = false` reverses the sort.
pub fn search_keys(
    store: &dyn SharedStore,
    prefix: &str,
    keyword: &str,
    start: usize,
    count: i64,
    ascending: bool,
) -> StoreResult<Vec<String>> {
    let mut matches: Vec<String> = store
        .keys_with_prefix(prefix)?
        .into_iter()
        .filter(|key| key[prefix.len()..].contains(keyword))
        .collect();

    matches.sort();
    if !ascending {
        matches.reverse();
    }

    let end = if count < 0 {
        matches.len()
    } else {
        (start + count as usize).min(matches.len())
    };

    if start >= matches.len() {
        return Ok(Vec::new());
    }
    Ok(matches[start..end].to_vec())
}
