//! Domain model for board-watch.
//!
//! This crate contains every domain identifier, shared value type, column
//! value type, and error type used throughout the workspace, plus the port
//! traits the core consumes. Infrastructure crates implement the traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain types + port definitions.** This crate has no I/O dependencies.
//! It defines *what* the core needs from the remote service; infrastructure
//! crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`BoardId`, `GroupId`, `ItemId`, etc.) |
//! | [`types`] | Shared value types (`AccessToken`, `PollInterval`, `Timestamp`, etc.) |
//! | [`columns`] | Column types and typed column values |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`ports`] | `SnapshotProvider` and `MutationProvider` traits |

pub mod columns;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use columns::{ColumnType, ColumnValue, StatusValue};
pub use errors::{
    ColumnValueError, ConfigurationError, HandlerError, RemoteFetchError, RemoteWriteError,
    RetryPolicy,
};
pub use identifiers::{
    AssetId, BoardId, ColumnId, DispatchId, GroupId, ItemId, UpdateId, WorkspaceId,
};
pub use ports::{
    MutationProvider, RemoteBoard, RemoteColumn, RemoteGroup, RemoteItem, RemoteItemRecord,
    SnapshotProvider,
};
pub use types::{AccessToken, ItemStatus, PollInterval, Timestamp};
