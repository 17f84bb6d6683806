//! Membership reconciliation.
//!
//! A group's membership is always replaced as a whole. The reconciler turns
//! the stored and desired member sets into the rows to insert and delete, and
//! the orphan helpers work out which member entities would lose their last
//! association as a result.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

/// Rows to insert and delete to move a membership from one set to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDelta<T: Ord> {
    pub to_insert: BTreeSet<T>,
    pub to_delete: BTreeSet<T>,
}

impl<T: Ord> Default for MembershipDelta<T> {
    fn default() -> Self {
        Self {
            to_insert: BTreeSet::new(),
            to_delete: BTreeSet::new(),
        }
    }
}

/// ## Summary
/// Computes `desired - current` as inserts and `current - desired` as deletes.
///
/// Pure and deterministic; reconciling the applied result against `desired`
/// yields an empty delta.
#[must_use]
pub fn reconcile<T: Ord + Clone>(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> MembershipDelta<T> {
    MembershipDelta {
        to_insert: desired.difference(current).cloned().collect(),
        to_delete: current.difference(desired).cloned().collect(),
    }
}

impl<T: Ord + Clone> MembershipDelta<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    /// ## Summary
    /// Returns `current` with the delta applied.
    #[must_use]
    pub fn apply(&self, current: &BTreeSet<T>) -> BTreeSet<T> {
        current
            .difference(&self.to_delete)
            .chain(self.to_insert.iter())
            .cloned()
            .collect()
    }
}

/// ## Summary
/// Counts, per member, how many associations a batch of removals drops.
#[must_use]
pub fn removal_counts<'a, T, I>(removals: I) -> BTreeMap<T, i64>
where
    T: Ord + Clone + 'a,
    I: IntoIterator<Item = &'a BTreeSet<T>>,
{
    let mut counts = BTreeMap::new();
    for set in removals {
        for member in set {
            *counts.entry(member.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// ## Summary
/// Returns members whose association count would reach zero.
///
/// `association_counts` holds the stored number of associations per member
/// (missing means zero). A member that already has no associations is not
/// reported, and neither is one that the same batch associates again.
#[must_use]
pub fn orphaned_members<T>(
    removals: &BTreeMap<T, i64>,
    association_counts: &HashMap<T, i64>,
    re_added: &BTreeSet<T>,
) -> Vec<T>
where
    T: Ord + Hash + Clone,
{
    removals
        .iter()
        .filter(|(member, _)| !re_added.contains(*member))
        .filter(|(member, removed)| {
            let stored = association_counts.get(*member).copied().unwrap_or(0);
            stored > 0 && **removed >= stored
        })
        .map(|(member, _)| member.clone())
        .collect()
}
