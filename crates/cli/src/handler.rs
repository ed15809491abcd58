//! The handler `board-watch` binds to every watched group.

use async_trait::async_trait;
use model::{BoardId, GroupId, HandlerError};
use tracing::info;
use workspace::{ItemHandler, NewItem, RemoteHandle};

/// Logs each new item and, when a target group is configured, creates an item
/// with the same name there.
#[derive(Debug, Clone)]
pub struct ForwardingHandler {
    remote: RemoteHandle,
    board: BoardId,
    target: Option<GroupId>,
}

impl ForwardingHandler {
    pub fn new(remote: RemoteHandle, board: BoardId, target: Option<GroupId>) -> Self {
        Self { remote, board, target }
    }
}

#[async_trait]
impl ItemHandler for ForwardingHandler {
    async fn handle(&self, item: NewItem) -> Result<(), HandlerError> {
        info!(
            group = %item.group_title,
            item = %item.item,
            name = %item.name,
            observed_at = %item.observed_at.as_datetime(),
            "new item"
        );
        if let Some(target) = &self.target {
            let copy = self.remote.create_item(&self.board, target, &item.name, &[]).await?;
            info!(item = %item.item, copy = %copy, "item forwarded");
        }
        Ok(())
    }
}
