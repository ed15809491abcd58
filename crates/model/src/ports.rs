//! Port traits: what the core needs from the remote service.
//!
//! The core never speaks HTTP. Infrastructure crates implement these traits;
//! tests implement them in memory.
//!
//! Both traits take the [`AccessToken`] on every call. A workspace is
//! identified by its token, so the same provider instance can serve several
//! workspaces.

use std::path::Path;

use async_trait::async_trait;

use crate::{
    AccessToken, AssetId, BoardId, ColumnId, ColumnType, ColumnValue, GroupId, ItemId,
    RemoteFetchError, RemoteWriteError, UpdateId, WorkspaceId,
};

// ----------------------------------------------------------------------------
// Read-side records
// ----------------------------------------------------------------------------

/// One item as currently listed in a remote group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteItem {
    pub id: ItemId,
    pub name: String,
}

/// A group as listed on a remote board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGroup {
    pub id: GroupId,
    pub title: String,
}

/// A column as listed on a remote board.
///
/// `column_type` is `None` for remote column types outside [`ColumnType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteColumn {
    pub id: ColumnId,
    pub title: String,
    pub description: String,
    pub column_type: Option<ColumnType>,
}

/// An item on a remote board together with its cells' display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItemRecord {
    pub id: ItemId,
    pub name: String,
    pub group_id: GroupId,
    /// `(column, display text)` for every non-empty cell.
    pub cells: Vec<(ColumnId, String)>,
}

/// A full remote board, used to hydrate the workspace mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBoard {
    pub id: BoardId,
    pub name: String,
    pub workspace_id: Option<WorkspaceId>,
    pub groups: Vec<RemoteGroup>,
    pub columns: Vec<RemoteColumn>,
    pub items: Vec<RemoteItemRecord>,
}

// ----------------------------------------------------------------------------
// Snapshot provider
// ----------------------------------------------------------------------------

/// Idempotent, side-effect-free reads of remote board state.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Lists the items currently in one group, in the remote's listing order.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteFetchError`] on network, auth, or rate-limit failure.
    async fn fetch_group_items(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<Vec<RemoteItem>, RemoteFetchError>;

    /// Lists the groups currently on a board.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteFetchError`] on network, auth, or rate-limit failure.
    async fn fetch_board_groups(
        &self,
        token: &AccessToken,
        board: &BoardId,
    ) -> Result<Vec<RemoteGroup>, RemoteFetchError>;

    /// Loads every board belonging to the workspace named `workspace`.
    ///
    /// An empty result means the remote does not know the workspace.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteFetchError`] on network, auth, or rate-limit failure.
    async fn fetch_workspace_boards(
        &self,
        token: &AccessToken,
        workspace: &str,
    ) -> Result<Vec<RemoteBoard>, RemoteFetchError>;
}

// ----------------------------------------------------------------------------
// Mutation provider
// ----------------------------------------------------------------------------

/// Remote writes. Each call either returns the identifier the remote assigned
/// or fails with a [`RemoteWriteError`]; none are retried by the core.
#[async_trait]
pub trait MutationProvider: Send + Sync {
    /// Creates a private board in `workspace`.
    async fn create_board(
        &self,
        token: &AccessToken,
        name: &str,
        workspace: Option<&WorkspaceId>,
    ) -> Result<BoardId, RemoteWriteError>;

    /// Deletes a group and every item in it.
    async fn delete_group(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<(), RemoteWriteError>;

    async fn create_group(
        &self,
        token: &AccessToken,
        board: &BoardId,
        title: &str,
    ) -> Result<GroupId, RemoteWriteError>;

    async fn create_column(
        &self,
        token: &AccessToken,
        board: &BoardId,
        title: &str,
        description: &str,
        column_type: ColumnType,
    ) -> Result<ColumnId, RemoteWriteError>;

    /// Creates an item with initial column values. Values have already been
    /// validated against their columns' types.
    async fn create_item(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
        name: &str,
        values: &[(ColumnId, ColumnValue)],
    ) -> Result<ItemId, RemoteWriteError>;

    async fn change_column_value(
        &self,
        token: &AccessToken,
        board: &BoardId,
        item: &ItemId,
        column: &ColumnId,
        value: &ColumnValue,
    ) -> Result<(), RemoteWriteError>;

    /// Uploads one local file into a file column. A column holds as many files
    /// as are uploaded into it.
    async fn upload_file(
        &self,
        token: &AccessToken,
        item: &ItemId,
        column: &ColumnId,
        path: &Path,
    ) -> Result<AssetId, RemoteWriteError>;

    /// Posts an update (comment) on an item.
    async fn create_update(
        &self,
        token: &AccessToken,
        item: &ItemId,
        body: &str,
    ) -> Result<UpdateId, RemoteWriteError>;
}
