//! Sorted, deduplicated sequences.
//!
//! Catalog parts listings are plain sorted vectors; these helpers keep them
//! that way without pulling every caller into `BTreeSet` conversions.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

/// Unique elements of `items` in ascending order.
pub fn set<T: Ord + Clone>(items: &[T]) -> Vec<T> {
    items
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sort `items` in place and return them.
pub fn sort<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

/// Sorted keys of a map.
pub fn keys<K: Ord + Clone, V, S: BuildHasher>(map: &HashMap<K, V, S>) -> Vec<K> {
    sort(map.keys().cloned().collect())
}

/// Linear membership scan.
pub fn member<T: PartialEq>(items: &[T], candidate: &T) -> bool {
    items.iter().any(|item| item == candidate)
}

/// Insert `candidate` unless present. Returns the sorted set and whether it
/// changed.
pub fn update<T: Ord>(mut items: Vec<T>, candidate: T) -> (Vec<T>, bool) {
    if member(&items, &candidate) {
        return (items, false);
    }
    items.push(candidate);
    (sort(items), true)
}

/// Sorted intersection of two sequences.
pub fn intersect<T: Ord + Clone>(left: &[T], right: &[T]) -> Vec<T> {
    let (probe, scan) = if right.len() < left.len() {
        (right, left)
    } else {
        (left, right)
    };
    let checked: BTreeSet<&T> = probe.iter().collect();
    let mut missing = checked.len();
    let mut found = BTreeSet::new();
    for candidate in scan {
        if missing == 0 {
            break;
        }
        if checked.contains(candidate) && found.insert(candidate.clone()) {
            missing -= 1;
        }
    }
    found.into_iter().collect()
}

/// Sorted union of two sequences.
pub fn union<T: Ord + Clone>(left: &[T], right: &[T]) -> Vec<T> {
    left.iter()
        .chain(right.iter())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Presence map of `items` for constant-time lookups.
pub fn membership<T: Eq + Hash + Clone>(items: &[T]) -> HashSet<T> {
    items.iter().cloned().collect()
}
