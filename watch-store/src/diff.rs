//! Ordered-list diffing
//!
//! Computes the edits that turn one version of an ordered list into another,
//! expressed as insert/remove/move deltas. Replaying the deltas over the old
//! list reproduces the new list exactly, so observers holding a copy of the
//! old list can converge without ever seeing the full new list.
//!
//! Elements must be unique within each list. UPnP track IDs and room names
//! both satisfy this; with duplicates the edit script would be ambiguous.

use std::collections::HashSet;
use std::hash::Hash;

/// A single edit in an ordered-list diff
///
/// Indices are positions in the list *at the moment the delta is applied*,
/// not positions in the original list. Apply deltas strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDelta<T> {
    /// `item` appears at `index` in the updated list
    Insert { index: usize, item: T },
    /// The element at `index` is gone from the updated list
    Remove { index: usize, item: T },
    /// The element at `from` now lives at `to`
    Move { from: usize, to: usize },
}

/// Diff two ordered lists of unique elements into replayable deltas
///
/// The edit script is emitted in three passes: removals (right to left, so
/// indices of pending removals stay valid), insertions (left to right), then
/// moves to fix residual ordering. An unchanged list yields no deltas, a pure
/// append yields only `Insert`s, a pure truncation only `Remove`s, and a
/// permutation only `Move`s.
pub fn diff_ordered<T>(old: &[T], new: &[T]) -> Vec<ListDelta<T>>
where
    T: Clone + Eq + Hash + std::fmt::Debug,
{
    debug_assert!(is_unique(old), "diff_ordered: old list has duplicates");
    debug_assert!(is_unique(new), "diff_ordered: new list has duplicates");

    let mut deltas = Vec::new();
    let mut working: Vec<T> = old.to_vec();

    let target: HashSet<&T> = new.iter().collect();

    // Drop everything the target no longer contains.
    for i in (0..working.len()).rev() {
        if !target.contains(&working[i]) {
            let item = working.remove(i);
            deltas.push(ListDelta::Remove { index: i, item });
        }
    }

    // Insert what the target introduces. Left to right keeps every insertion
    // index within bounds: by position i, all new-only elements before i are
    // already in place.
    let survivors: HashSet<&T> = working.iter().collect();
    let additions: Vec<(usize, T)> = new
        .iter()
        .enumerate()
        .filter(|(_, item)| !survivors.contains(item))
        .map(|(i, item)| (i, item.clone()))
        .collect();
    for (index, item) in additions {
        working.insert(index, item.clone());
        deltas.push(ListDelta::Insert { index, item });
    }

    // Same elements now, possibly the wrong order. Walk the target and pull
    // each misplaced element forward.
    for i in 0..new.len() {
        if working[i] != new[i] {
            let from = working[i + 1..]
                .iter()
                .position(|x| *x == new[i])
                .map(|p| p + i + 1)
                .expect("diff_ordered: element sets diverged (this is a bug)");
            let item = working.remove(from);
            working.insert(i, item);
            deltas.push(ListDelta::Move { from, to: i });
        }
    }

    debug_assert_eq!(working, new);
    deltas
}

/// Replay a delta script over a list
///
/// Deltas must come from [`diff_ordered`] against this exact list state and
/// be applied in order; indices are positional, not stable identifiers.
pub fn apply_deltas<T: Clone>(list: &mut Vec<T>, deltas: &[ListDelta<T>]) {
    for delta in deltas {
        match delta {
            ListDelta::Insert { index, item } => list.insert(*index, item.clone()),
            ListDelta::Remove { index, .. } => {
                list.remove(*index);
            }
            ListDelta::Move { from, to } => {
                let item = list.remove(*from);
                list.insert(*to, item);
            }
        }
    }
}

fn is_unique<T: Eq + Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().all(|item| seen.insert(item))
}
