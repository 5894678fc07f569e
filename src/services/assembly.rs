// src/services/assembly.rs

//! Editing the ordered question list of a test.

use std::collections::HashSet;

/// Appends the ids of `incoming` that are not already in `existing`.
///
/// Existing order is kept and duplicates inside `incoming` are dropped, so
/// merging the same list twice is a no-op.
pub fn merge_question_refs(existing: &[i64], incoming: &[i64]) -> Vec<i64> {
    let mut seen: HashSet<i64> = existing.iter().copied().collect();
    let mut merged = existing.to_vec();
    for &id in incoming {
        if seen.insert(id) {
            merged.push(id);
        }
    }
    merged
}

pub fn remove_question_refs(existing: &[i64], to_remove: &HashSet<i64>) -> Vec<i64> {
    existing
        .iter()
        .copied()
        .filter(|id| !to_remove.contains(id))
        .collect()
}

/// Puts `new` where `old` was.
///
/// When `new` is already on the list elsewhere, `old` is dropped instead so the
/// list never holds the same id twice. An absent `old` leaves the list as is.
pub fn replace_question_ref(existing: &[i64], old: i64, new: i64) -> Vec<i64> {
    if old == new || !existing.contains(&old) {
        return existing.to_vec();
    }
    if existing.contains(&new) {
        return existing.iter().copied().filter(|&id| id != old).collect();
    }
    existing
        .iter()
        .map(|&id| if id == old { new } else { id })
        .collect()
}
