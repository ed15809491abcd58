//! Shared handle to the remote service.

use std::sync::Arc;

use model::{
    AccessToken, BoardId, ColumnId, ColumnValue, GroupId, ItemId, ItemStatus, MutationProvider,
    RemoteWriteError, SnapshotProvider,
};

/// Access token plus the two remote ports, bundled for cheap cloning.
///
/// Every board in a workspace holds a clone, and handlers may capture one to
/// issue further remote mutations (for example, copying a new item into
/// another group) without borrowing the mirror.
#[derive(Clone)]
pub struct RemoteHandle {
    token: AccessToken,
    reader: Arc<dyn SnapshotProvider>,
    writer: Arc<dyn MutationProvider>,
}

impl RemoteHandle {
    pub fn new(
        token: AccessToken,
        reader: Arc<dyn SnapshotProvider>,
        writer: Arc<dyn MutationProvider>,
    ) -> Self {
        Self { token, reader, writer }
    }

    /// Builds a handle from one client that implements both ports.
    pub fn from_client<C>(token: AccessToken, client: Arc<C>) -> Self
    where
        C: SnapshotProvider + MutationProvider + 'static,
    {
        let reader: Arc<dyn SnapshotProvider> = client.clone();
        let writer: Arc<dyn MutationProvider> = client;
        Self { token, reader, writer }
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn reader(&self) -> &Arc<dyn SnapshotProvider> {
        &self.reader
    }

    pub fn writer(&self) -> &Arc<dyn MutationProvider> {
        &self.writer
    }

    /// Creates an item on the remote only. Intended for handlers, which do not
    /// hold the mirror; the mirror learns nothing about the new item.
    ///
    /// # Errors
    ///
    /// Returns the [`RemoteWriteError`] reported by the mutation provider.
    pub async fn create_item(
        &self,
        board: &BoardId,
        group: &GroupId,
        name: &str,
        values: &[(ColumnId, ColumnValue)],
    ) -> Result<ItemId, RemoteWriteError> {
        self.writer.create_item(&self.token, board, group, name, values).await
    }

    /// Sets an item's execution status on a status column.
    ///
    /// # Errors
    ///
    /// Returns the [`RemoteWriteError`] reported by the mutation provider.
    pub async fn set_status(
        &self,
        board: &BoardId,
        item: &ItemId,
        column: &ColumnId,
        status: ItemStatus,
    ) -> Result<(), RemoteWriteError> {
        let value = ColumnValue::status_index(status.label_index());
        self.writer
            .change_column_value(&self.token, board, item, column, &value)
            .await
    }
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
