//! Per-group snapshots used for diffing.
//!
//! A snapshot is the set of item ids seen at the last successful fetch of a
//! group. It is replaced wholesale by every successful fetch and left alone by
//! a failed one, so the next diff always runs against the last state that was
//! actually observed.
//!
//! Alongside the snapshot each group remembers every id it has ever reported
//! as new. An item that leaves a group and comes back is therefore not
//! reported twice. That set only grows, bounded by the number of distinct
//! items the group has held during the process lifetime.

use std::collections::{HashMap, HashSet};

use model::{GroupId, ItemId, RemoteItem};

#[derive(Debug, Default)]
struct GroupSnapshot {
    current: HashSet<ItemId>,
    seen: HashSet<ItemId>,
}

/// Result of folding one fresh listing into a group's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// `true` when this was the group's first successful observation.
    pub first_observation: bool,
    /// Items absent from the previous snapshot and never reported before, in
    /// listing order.
    pub fresh: Vec<RemoteItem>,
}

/// Last-observed item sets, keyed by group.
///
/// Owned by a single change detector. Groups are partitioned by id, so boards
/// never interfere with each other's state.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    groups: HashMap<GroupId, GroupSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `group` has been observed successfully at least once.
    pub fn is_baselined(&self, group: &GroupId) -> bool {
        self.groups.contains_key(group)
    }

    /// The item ids seen at the last successful fetch of `group`.
    pub fn current(&self, group: &GroupId) -> Option<&HashSet<ItemId>> {
        self.groups.get(group).map(|g| &g.current)
    }

    /// Sets the snapshot of `group` to `items` without reporting anything.
    ///
    /// Seeded ids count as already reported, the same as a silent baseline.
    pub fn seed(&mut self, group: &GroupId, items: HashSet<ItemId>) {
        let snapshot = self.groups.entry(group.clone()).or_default();
        snapshot.seen.extend(items.iter().cloned());
        snapshot.current = items;
    }

    /// Diffs `listing` against the previous snapshot of `group`, then replaces
    /// the snapshot with `listing`.
    ///
    /// Call only with the result of a successful fetch.
    pub fn advance(&mut self, group: &GroupId, listing: &[RemoteItem]) -> Advance {
        let first_observation = !self.groups.contains_key(group);
        let snapshot = self.groups.entry(group.clone()).or_default();

        let mut now = HashSet::with_capacity(listing.len());
        let mut fresh = Vec::new();
        for item in listing {
            // Remote listings can repeat an item across page boundaries.
            if !now.insert(item.id.clone()) {
                continue;
            }
            if !snapshot.current.contains(&item.id) && snapshot.seen.insert(item.id.clone()) {
                fresh.push(item.clone());
            }
        }
        snapshot.current = now;

        Advance { first_observation, fresh }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
