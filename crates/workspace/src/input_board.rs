//! Input boards: boards whose groups feed handlers.
//!
//! DESIGN
//! ======
//! An [`InputBoard`] owns a mirrored [`Board`], a static [`ExecutionMapping`]
//! and an explicit lifecycle: `Created -> Running -> Stopped`. `start()`
//! resolves the watch set (mapping titles that name an actual group; unmapped
//! groups are never polled) and spawns one poll-loop task that owns the
//! [`ChangeDetector`] and the [`Dispatcher`]. `stop()` signals the loop over a
//! `watch` channel and waits for it to exit.
//!
//! With [`InitialItems::Baseline`] each watched group's snapshot is seeded
//! from the items the mirror holds when `start()` runs, so an item created
//! after hydration fires even if the first fetch of its group fails.
//!
//! The stop signal is raced against every group fetch. A cycle cut short by
//! it dispatches nothing, and after `stop()` returns no further cycle runs and
//! no further event is dispatched.
//!
//! Dropping a running board without `stop()` ends the loop the same way and
//! leaves in-flight handlers running in the background, as
//! [`StopMode::Graceful`] does.

use std::num::NonZeroUsize;
use std::sync::Arc;

use model::{ColumnType, ConfigurationError, PollInterval};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

use crate::detector::{ChangeDetector, InitialItems, WatchedGroup};
use crate::dispatch::{
    DispatchCounters, DispatchStats, Dispatcher, ExecutionMapping, StatusReporter, StopMode,
};
use crate::mirror::Board;

/// Title of the status column input boards use to report handler progress.
pub const STATUS_COLUMN_TITLE: &str = "Execution Status";

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Tuning for one input board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBoardConfig {
    pub poll_interval: PollInterval,
    pub initial_items: InitialItems,
    /// `None` spawns every handler immediately.
    pub max_concurrent_handlers: Option<NonZeroUsize>,
    /// Write `Working` / `Done` / `Stuck` to the [`STATUS_COLUMN_TITLE`] column.
    pub track_status: bool,
}

impl Default for InputBoardConfig {
    fn default() -> Self {
        Self {
            poll_interval: PollInterval::DEFAULT,
            initial_items: InitialItems::Baseline,
            max_concurrent_handlers: None,
            track_status: true,
        }
    }
}

impl InputBoardConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, interval: PollInterval) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_initial_items(mut self, initial: InitialItems) -> Self {
        self.initial_items = initial;
        self
    }

    /// Bounds handler concurrency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroConcurrency`] for a bound of zero.
    pub fn with_max_concurrent_handlers(mut self, limit: usize) -> Result<Self, ConfigurationError> {
        let limit = NonZeroUsize::new(limit).ok_or(ConfigurationError::ZeroConcurrency)?;
        self.max_concurrent_handlers = Some(limit);
        Ok(self)
    }

    #[must_use]
    pub fn with_status_tracking(mut self, enabled: bool) -> Self {
        self.track_status = enabled;
        self
    }
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("input board '{board}' is already running")]
    AlreadyRunning { board: String },

    #[error("input board '{board}' has been stopped and cannot be restarted")]
    Stopped { board: String },

    #[error("poll loop of input board '{board}' ended abnormally: {message}")]
    LoopFailed { board: String, message: String },
}

/// Observable lifecycle state of an [`InputBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Created,
    Running,
    Stopped,
}

enum RunState {
    Created,
    Running {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<Option<Dispatcher>>,
    },
    Stopped {
        drain: Option<JoinHandle<()>>,
    },
}

/// A board that watches some of its groups and runs handlers for new items.
pub struct InputBoard {
    board: Board,
    mapping: ExecutionMapping,
    config: InputBoardConfig,
    counters: Arc<DispatchCounters>,
    state: RunState,
}

impl InputBoard {
    pub fn new(board: Board, mapping: ExecutionMapping, config: InputBoardConfig) -> Self {
        Self {
            board,
            mapping,
            config,
            counters: Arc::new(DispatchCounters::default()),
            state: RunState::Created,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable access to the underlying board. Groups added while running are
    /// not watched; the watch set is fixed by `start()`.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub(crate) fn into_board(self) -> Board {
        self.board
    }

    pub fn mapping(&self) -> &ExecutionMapping {
        &self.mapping
    }

    pub fn config(&self) -> &InputBoardConfig {
        &self.config
    }

    pub fn state(&self) -> BoardState {
        match self.state {
            RunState::Created => BoardState::Created,
            RunState::Running { .. } => BoardState::Running,
            RunState::Stopped { .. } => BoardState::Stopped,
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Groups that `start()` would poll: mapped titles that name a group on
    /// this board.
    pub fn watch_set(&self) -> Vec<WatchedGroup> {
        self.board
            .groups()
            .filter(|group| self.mapping.contains(group.title()))
            .map(|group| WatchedGroup {
                board: self.board.id().clone(),
                group: group.id().clone(),
                title: group.title().to_string(),
            })
            .collect()
    }

    /// Starts polling. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::AlreadyRunning`] if the board is running.
    /// - [`LifecycleError::Stopped`] if the board has been stopped.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            RunState::Created => {}
            RunState::Running { .. } => {
                return Err(LifecycleError::AlreadyRunning { board: self.board.name().to_string() })
            }
            RunState::Stopped { .. } => {
                return Err(LifecycleError::Stopped { board: self.board.name().to_string() })
            }
        }

        let watched = self.watch_set();
        for title in self.mapping.group_titles() {
            if self.board.group(title).is_none() {
                warn!(board = %self.board.name(), group = title, "handler registered for a group that does not exist; ignored");
            }
        }

        let remote = self.board.remote().clone();
        let mut detector = ChangeDetector::new(
            Arc::clone(remote.reader()),
            remote.token().clone(),
            watched,
            self.config.initial_items,
        );
        if self.config.initial_items == InitialItems::Baseline {
            for group in self.board.groups().filter(|g| self.mapping.contains(g.title())) {
                detector.seed(group.id(), group.items().map(|item| item.id().clone()).collect());
            }
        }

        let mut dispatcher =
            Dispatcher::new(self.mapping.clone()).with_counters(Arc::clone(&self.counters));
        if let Some(limit) = self.config.max_concurrent_handlers {
            dispatcher = dispatcher.with_concurrency_limit(limit);
        }
        if let Some(status) = self.status_reporter() {
            dispatcher = dispatcher.with_status_reporter(status);
        }

        info!(
            board = %self.board.name(),
            watched = detector.watched().len(),
            interval = %self.config.poll_interval,
            "input board starting"
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let span = tracing::info_span!("input_board", board = %self.board.name());
        let task = tokio::spawn(
            run_poll_loop(detector, dispatcher, self.config.poll_interval, shutdown_rx)
                .instrument(span),
        );
        self.state = RunState::Running { shutdown, task };
        Ok(())
    }

    /// Stops polling and waits for the poll loop to exit.
    ///
    /// Stopping a board that never started, or stopping twice, is a no-op
    /// beyond the state transition.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LoopFailed`] if the poll loop panicked. The
    /// board is `Stopped` either way.
    pub async fn stop(&mut self, mode: StopMode) -> Result<(), LifecycleError> {
        let previous = std::mem::replace(&mut self.state, RunState::Stopped { drain: None });
        let (shutdown, task) = match previous {
            RunState::Created => return Ok(()),
            RunState::Stopped { drain } => {
                self.state = RunState::Stopped { drain };
                return Ok(());
            }
            RunState::Running { shutdown, task } => (shutdown, task),
        };

        // A send error means the loop already exited and dropped its receiver.
        let _ = shutdown.send(true);
        match task.await {
            Ok(dispatcher) => {
                let drain = match dispatcher {
                    Some(dispatcher) => dispatcher.shutdown(mode).await,
                    None => None,
                };
                self.state = RunState::Stopped { drain };
                info!(board = %self.board.name(), ?mode, "input board stopped");
                Ok(())
            }
            Err(e) => Err(LifecycleError::LoopFailed {
                board: self.board.name().to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// After a [`StopMode::Graceful`] stop, waits for handlers that were still
    /// running. Returns immediately in every other state.
    pub async fn wait_for_handlers(&mut self) {
        if let RunState::Stopped { drain } = &mut self.state {
            if let Some(handle) = drain.take() {
                let _ = handle.await;
            }
        }
    }

    fn status_reporter(&self) -> Option<StatusReporter> {
        if !self.config.track_status {
            return None;
        }
        match self.board.column(STATUS_COLUMN_TITLE) {
            Some(column) if column.column_type() == ColumnType::Status => Some(StatusReporter::new(
                self.board.remote().clone(),
                self.board.id().clone(),
                column.id().clone(),
            )),
            _ => {
                warn!(board = %self.board.name(), "status tracking enabled but board has no status column");
                None
            }
        }
    }
}

impl std::fmt::Debug for InputBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBoard")
            .field("board", &self.board.name())
            .field("mapping", &self.mapping)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_poll_loop(
    mut detector: ChangeDetector,
    mut dispatcher: Dispatcher,
    interval: PollInterval,
    mut shutdown: watch::Receiver<bool>,
) -> Option<Dispatcher> {
    let mut ticker = tokio::time::interval(interval.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let report = detector.poll_until_stopped(&mut shutdown).await;
        if report.interrupted {
            break;
        }
        if !report.failures.is_empty() {
            debug!(cycle = report.cycle, failed = report.failures.len(), "cycle finished with fetch failures");
        }
        for event in report.events {
            dispatcher.dispatch(event);
        }
        dispatcher.reap();
    }

    debug!(cycles = detector.cycles(), "poll loop exited");

    // A closed channel means the board was dropped and nobody awaits this task.
    if shutdown.has_changed().is_err() {
        if dispatcher.shutdown(StopMode::Graceful).await.is_some() {
            debug!("input board dropped while running; handlers detached");
        }
        return None;
    }
    Some(dispatcher)
}

#[cfg(test)]
#[path = "input_board_tests.rs"]
mod tests;
