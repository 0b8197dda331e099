//! Reference-stable snapshot diffing.

use launchkit::Service;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An entry with a stable id and fields that change between refreshes.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Whether anything a caller redraws on differs from `other`.
    fn volatile_differs(&self, other: &Self) -> bool;
}

impl Keyed for Service {
    fn key(&self) -> &str {
        &self.id
    }

    fn volatile_differs(&self, other: &Self) -> bool {
        Service::volatile_differs(self, other)
    }
}

/// Result of merging a fresh snapshot into the current one.
#[derive(Debug, Clone)]
pub enum MergeOutcome<T> {
    /// Nothing volatile changed; keep the current state as is
    Unchanged,
    /// Replace the current state with this list
    Replaced(Vec<Arc<T>>),
}

impl<T> MergeOutcome<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, MergeOutcome::Unchanged)
    }
}

/// Merge `new` into `old`.
///
/// If any id was added or removed, `new` is returned as is. Otherwise
/// entries whose volatile fields are unchanged are the same `Arc` as in
/// `old`, in `new`'s order. When nothing changed at all the result is
/// [`MergeOutcome::Unchanged`].
pub fn merge<T: Keyed>(old: &[Arc<T>], new: Vec<Arc<T>>) -> MergeOutcome<T> {
    let previous: HashMap<&str, &Arc<T>> = old.iter().map(|s| (s.key(), s)).collect();
    let incoming: HashSet<&str> = new.iter().map(|s| s.key()).collect();
    // Duplicate ids on either side count as a membership change
    let same_ids = old.len() == new.len()
        && previous.len() == old.len()
        && incoming.len() == new.len()
        && incoming.iter().all(|key| previous.contains_key(key));
    if !same_ids {
        log::debug!("Snapshot membership changed ({} -> {})", old.len(), new.len());
        return MergeOutcome::Replaced(new);
    }

    let mut changed = 0usize;
    let merged: Vec<Arc<T>> = new
        .into_iter()
        .map(|fresh| match previous.get(fresh.key()) {
            Some(prev) if !prev.volatile_differs(&fresh) => Arc::clone(prev),
            _ => {
                changed += 1;
                fresh
            }
        })
        .collect();

    if changed == 0 {
        MergeOutcome::Unchanged
    } else {
        log::debug!("{} of {} services changed", changed, merged.len());
        MergeOutcome::Replaced(merged)
    }
}
