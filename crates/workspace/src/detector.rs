//! Change detection: one poll cycle over every watched group.
//!
//! DESIGN
//! ======
//! Each cycle fetches every watched group sequentially, folds the listing
//! into the [`SnapshotStore`], and collects one [`NewItem`] per fresh item.
//! The detector never dispatches; the input board's loop hands the report to
//! the dispatch engine so handler execution stays off this call stack.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch is logged and recorded in the [`CycleReport`]; the group's
//! snapshot is left untouched so the next successful fetch diffs against the
//! last state actually observed. No failure ends the cycle early.
//!
//! STOPPING
//! ========
//! [`ChangeDetector::poll_until_stopped`] races every fetch against the stop
//! signal. An interrupted fetch is dropped before its listing reaches the
//! store, so an interrupted cycle leaves the snapshots of the remaining
//! groups exactly as they were.

use std::collections::HashSet;
use std::sync::Arc;

use model::{
    AccessToken, BoardId, GroupId, ItemId, RemoteFetchError, RetryPolicy, SnapshotProvider,
    Timestamp,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::snapshot::SnapshotStore;

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

/// A group the detector polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedGroup {
    pub board: BoardId,
    pub group: GroupId,
    pub title: String,
}

/// An item observed in a watched group for the first time.
///
/// Handlers receive this by value; nothing in it refers back to detector
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub board: BoardId,
    pub group: GroupId,
    pub group_title: String,
    pub item: ItemId,
    /// The item's display name at the time it was observed.
    pub name: String,
    pub observed_at: Timestamp,
}

/// What to do with items already present the first time a group is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialItems {
    /// Record them as the baseline without dispatching.
    #[default]
    Baseline,
    /// Treat them as new; each fires its handler once.
    Dispatch,
}

/// A watched group whose fetch failed during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFailure {
    pub group: GroupId,
    pub group_title: String,
    pub error: RemoteFetchError,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    /// 1-based cycle counter.
    pub cycle: u64,
    pub events: Vec<NewItem>,
    pub failures: Vec<GroupFailure>,
    /// Groups whose first successful fetch was recorded as a silent baseline.
    pub baselined: Vec<GroupId>,
    /// The stop signal arrived before every group was fetched.
    pub interrupted: bool,
}

// ----------------------------------------------------------------------------
// Detector
// ----------------------------------------------------------------------------

/// Polls a fixed set of groups and reports items that newly appeared.
pub struct ChangeDetector {
    reader: Arc<dyn SnapshotProvider>,
    token: AccessToken,
    watched: Vec<WatchedGroup>,
    store: SnapshotStore,
    initial: InitialItems,
    cycles: u64,
}

impl ChangeDetector {
    pub fn new(
        reader: Arc<dyn SnapshotProvider>,
        token: AccessToken,
        watched: Vec<WatchedGroup>,
        initial: InitialItems,
    ) -> Self {
        Self { reader, token, watched, store: SnapshotStore::new(), initial, cycles: 0 }
    }

    pub fn watched(&self) -> &[WatchedGroup] {
        &self.watched
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.store
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Records `items` as the last observed state of `group`, so the first
    /// fetch diffs against them instead of becoming a silent baseline.
    pub fn seed(&mut self, group: &GroupId, items: HashSet<ItemId>) {
        self.store.seed(group, items);
    }

    /// Runs one cycle over every watched group.
    pub async fn poll_once(&mut self) -> CycleReport {
        self.poll(None).await
    }

    /// Runs one cycle, abandoning it as soon as `shutdown` changes or its
    /// sender is dropped.
    pub async fn poll_until_stopped(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        self.poll(Some(shutdown)).await
    }

    async fn poll(&mut self, mut shutdown: Option<&mut watch::Receiver<bool>>) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport { cycle: self.cycles, ..CycleReport::default() };

        for watched in &self.watched {
            let fetch = self.reader.fetch_group_items(&self.token, &watched.board, &watched.group);
            let fetched = match shutdown.as_deref_mut() {
                Some(stop) => tokio::select! {
                    biased;
                    _ = stop.changed() => None,
                    result = fetch => Some(result),
                },
                None => Some(fetch.await),
            };
            let Some(fetched) = fetched else {
                debug!(cycle = self.cycles, group = %watched.title, "cycle interrupted by stop");
                report.interrupted = true;
                break;
            };

            let listing = match fetched {
                Ok(listing) => listing,
                Err(error) => {
                    let retry_after_secs = match error.retry_policy() {
                        RetryPolicy::Retryable { after } => after.map(|d| d.as_secs()),
                        RetryPolicy::NonRetryable => None,
                    };
                    warn!(
                        cycle = self.cycles,
                        board = %watched.board,
                        group = %watched.title,
                        error = %error,
                        retry_after_secs,
                        "group fetch failed; snapshot kept for next cycle"
                    );
                    report.failures.push(GroupFailure {
                        group: watched.group.clone(),
                        group_title: watched.title.clone(),
                        error,
                    });
                    continue;
                }
            };

            let advance = self.store.advance(&watched.group, &listing);
            if advance.first_observation && self.initial == InitialItems::Baseline {
                info!(
                    board = %watched.board,
                    group = %watched.title,
                    existing = listing.len(),
                    "group baselined"
                );
                report.baselined.push(watched.group.clone());
                continue;
            }

            if !advance.fresh.is_empty() {
                debug!(
                    cycle = self.cycles,
                    group = %watched.title,
                    count = advance.fresh.len(),
                    "new items observed"
                );
            }
            let observed_at = Timestamp::now();
            report.events.extend(advance.fresh.into_iter().map(|item| NewItem {
                board: watched.board.clone(),
                group: watched.group.clone(),
                group_title: watched.title.clone(),
                item: item.id,
                name: item.name,
                observed_at,
            }));
        }

        report
    }
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("watched", &self.watched)
            .field("initial", &self.initial)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
