//! Dispatch engine. Runs handlers for new items off the poll loop.
//!
//! DESIGN
//! ======
//! Every dispatched event becomes its own tokio task in a [`JoinSet`] owned by
//! the poll loop. Spawning never waits: with a concurrency bound configured,
//! the task itself waits for a semaphore permit, so a burst of new items
//! queues work without delaying the next poll cycle.
//!
//! ERROR HANDLING
//! ==============
//! Handler errors and panics are caught inside the task, logged with the
//! group, item and dispatch id, and counted. Nothing a handler does reaches
//! the change detector. Status-column writes are best effort and only logged.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use model::{BoardId, ColumnId, DispatchId, HandlerError, ItemStatus};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn, Instrument};

use crate::detector::NewItem;
use crate::remote::RemoteHandle;

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

/// Logic bound to a group title, invoked once per new item in that group.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    async fn handle(&self, item: NewItem) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> ItemHandler for F
where
    F: Fn(NewItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, item: NewItem) -> Result<(), HandlerError> {
        (self)(item).await
    }
}

/// Static binding from group title to handler.
///
/// Titles that match no group on the board are inert.
#[derive(Clone, Default)]
pub struct ExecutionMapping {
    handlers: HashMap<String, Arc<dyn ItemHandler>>,
}

impl ExecutionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to the group titled `title`, replacing any earlier
    /// binding for that title.
    #[must_use]
    pub fn on_group(mut self, title: impl Into<String>, handler: impl ItemHandler + 'static) -> Self {
        self.handlers.insert(title.into(), Arc::new(handler));
        self
    }

    pub fn handler(&self, title: &str) -> Option<&Arc<dyn ItemHandler>> {
        self.handlers.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.handlers.contains_key(title)
    }

    pub fn group_titles(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ExecutionMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut titles: Vec<&str> = self.group_titles().collect();
        titles.sort_unstable();
        f.debug_struct("ExecutionMapping").field("groups", &titles).finish()
    }
}

// ----------------------------------------------------------------------------
// Status reporting
// ----------------------------------------------------------------------------

/// Writes each dispatched item's progress to a status column on its board.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    remote: RemoteHandle,
    board: BoardId,
    column: ColumnId,
}

impl StatusReporter {
    pub fn new(remote: RemoteHandle, board: BoardId, column: ColumnId) -> Self {
        Self { remote, board, column }
    }

    async fn report(&self, event: &NewItem, status: ItemStatus) {
        if let Err(e) = self.remote.set_status(&self.board, &event.item, &self.column, status).await {
            warn!(
                item = %event.item,
                group = %event.group_title,
                ?status,
                error = %e,
                "status update failed"
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time dispatch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Events handed to a handler task.
    pub dispatched: u64,
    /// Events with no registered handler.
    pub dropped: u64,
    pub succeeded: u64,
    /// Handlers that returned an error.
    pub failed: u64,
    pub panicked: u64,
}

impl DispatchStats {
    /// Handler invocations that have run to completion, whatever the outcome.
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

/// How in-flight handlers are treated when the dispatcher shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopMode {
    /// Handlers keep running in the background; outcomes are still logged.
    #[default]
    Graceful,
    /// Wait for every in-flight handler before returning.
    Drain,
    /// Cancel every in-flight handler.
    Abort,
}

/// Spawns handler tasks for new-item events.
pub struct Dispatcher {
    mapping: ExecutionMapping,
    limiter: Option<Arc<Semaphore>>,
    status: Option<StatusReporter>,
    counters: Arc<DispatchCounters>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(mapping: ExecutionMapping) -> Self {
        Self {
            mapping,
            limiter: None,
            status: None,
            counters: Arc::new(DispatchCounters::default()),
            tasks: JoinSet::new(),
        }
    }

    /// Caps the number of handlers running at once. Excess invocations are
    /// spawned immediately and wait for a free slot.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: NonZeroUsize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit.get())));
        self
    }

    #[must_use]
    pub fn with_status_reporter(mut self, status: StatusReporter) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub(crate) fn with_counters(mut self, counters: Arc<DispatchCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Handler tasks not yet reaped, finished or not.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Schedules the handler registered for `event`'s group.
    ///
    /// Returns `false` when no handler is registered; the event is dropped
    /// without error.
    pub fn dispatch(&mut self, event: NewItem) -> bool {
        let Some(handler) = self.mapping.handler(&event.group_title).cloned() else {
            trace!(group = %event.group_title, item = %event.item, "no handler registered; event dropped");
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let dispatch_id = DispatchId::new_random();
        let span = tracing::info_span!(
            "dispatch",
            %dispatch_id,
            group = %event.group_title,
            item = %event.item
        );
        let limiter = self.limiter.clone();
        let status = self.status.clone();
        let counters = Arc::clone(&self.counters);
        counters.dispatched.fetch_add(1, Ordering::Relaxed);

        self.tasks.spawn(
            async move {
                // Acquire only fails on a closed semaphore; this one is never closed.
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                if let Some(status) = &status {
                    status.report(&event, ItemStatus::Working).await;
                }
                debug!(name = %event.name, "handler started");

                let outcome = AssertUnwindSafe(handler.handle(event.clone())).catch_unwind().await;
                let final_status = match outcome {
                    Ok(Ok(())) => {
                        counters.succeeded.fetch_add(1, Ordering::Relaxed);
                        info!(name = %event.name, "handler finished");
                        ItemStatus::Done
                    }
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(name = %event.name, error = %e, "handler failed");
                        ItemStatus::Stuck
                    }
                    Err(panic) => {
                        counters.panicked.fetch_add(1, Ordering::Relaxed);
                        error!(name = %event.name, panic = %panic_message(&*panic), "handler panicked");
                        ItemStatus::Stuck
                    }
                };

                if let Some(status) = &status {
                    status.report(&event, final_status).await;
                }
            }
            .instrument(span),
        );
        true
    }

    /// Removes finished tasks from the set.
    pub fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                // Panics are caught inside the task; only cancellation lands here.
                debug!(error = %e, "handler task ended abnormally");
            }
        }
    }

    /// Shuts the dispatcher down.
    ///
    /// Returns the background drain task for [`StopMode::Graceful`] when
    /// handlers are still running.
    pub async fn shutdown(mut self, mode: StopMode) -> Option<JoinHandle<()>> {
        self.reap();
        let in_flight = self.tasks.len();
        match mode {
            StopMode::Abort => {
                if in_flight > 0 {
                    info!(in_flight, "aborting in-flight handlers");
                }
                self.tasks.shutdown().await;
                None
            }
            StopMode::Drain => {
                if in_flight > 0 {
                    info!(in_flight, "waiting for in-flight handlers");
                }
                while self.tasks.join_next().await.is_some() {}
                None
            }
            StopMode::Graceful => {
                if in_flight == 0 {
                    return None;
                }
                info!(in_flight, "in-flight handlers continue in the background");
                let mut tasks = self.tasks;
                Some(tokio::spawn(async move {
                    while tasks.join_next().await.is_some() {}
                }))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mapping", &self.mapping)
            .field("bounded", &self.limiter.is_some())
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
