//! Board-watch core: the workspace mirror and the change-detection engine.
//!
//! A [`Workspace`] mirrors remote boards as an owned tree of typed values.
//! Any board can be turned into an [`InputBoard`]: a board whose groups are
//! bound to handlers through an [`ExecutionMapping`]. A running input board
//! polls its watched groups on a fixed interval, diffs each listing against
//! the last one it saw, and runs the bound handler once for every item that
//! newly appears.
//!
//! ## Architectural Layer
//!
//! **Core.** Depends only on `model` and reaches the remote service through
//! the `SnapshotProvider` and `MutationProvider` ports bundled in a
//! [`RemoteHandle`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`mirror`] | `Workspace`, `Board`, `Group`, `Column`, `Item` |
//! | [`snapshot`] | Per-group item-id snapshots and diffing |
//! | [`detector`] | `ChangeDetector`: one poll cycle over the watched groups |
//! | [`dispatch`] | `ItemHandler`, `ExecutionMapping`, `Dispatcher` |
//! | [`input_board`] | `InputBoard` lifecycle and the poll loop |
//! | [`remote`] | `RemoteHandle` |

pub mod detector;
pub mod dispatch;
pub mod input_board;
pub mod mirror;
pub mod remote;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use detector::{ChangeDetector, CycleReport, GroupFailure, InitialItems, NewItem, WatchedGroup};
pub use dispatch::{
    DispatchStats, Dispatcher, ExecutionMapping, ItemHandler, StatusReporter, StopMode,
};
pub use input_board::{
    BoardState, InputBoard, InputBoardConfig, LifecycleError, STATUS_COLUMN_TITLE,
};
pub use mirror::{Board, Column, Group, Item, MirrorError, Workspace};
pub use remote::RemoteHandle;
pub use snapshot::{Advance, SnapshotStore};
