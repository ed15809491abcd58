//! HTTP client for the monday.com GraphQL API.
//!
//! DESIGN
//! ======
//! Every call goes through [`MondayClient::execute`]: build the request, send
//! it, read status and body, then hand both to the pure
//! [`classify_response`]. A rate-limited answer is retried after the delay the
//! API asked for, at most `max_retries` times. Every other failure is returned
//! unchanged; retrying writes is the caller's decision.
//!
//! Reads follow `items_page` cursors until the API stops returning one, so a
//! group listing is always complete and in the API's order.

use std::path::Path;

use async_trait::async_trait;
use model::{
    AccessToken, AssetId, BoardId, ColumnId, ColumnType, ColumnValue, GroupId, ItemId,
    MutationProvider, RemoteBoard, RemoteFetchError, RemoteGroup, RemoteItem, RemoteWriteError,
    SnapshotProvider, UpdateId, WorkspaceId,
};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::config::MondayConfig;
use crate::error::{classify_response, MondayError};
use crate::wire::{
    add_file_document, decode, encode_column_values, encode_value_argument, mutation_id, parse_id,
    to_remote_board, to_remote_group, to_remote_item, BoardDetail, BoardGroups, BoardSummary,
    Boards, GraphQlRequest, GroupItemsBoard, IdName, ItemRecord, NextItemsPage, BOARD_DETAIL,
    BOARD_GROUPS, CHANGE_COLUMN_VALUE, CREATE_BOARD, CREATE_COLUMN, CREATE_GROUP, CREATE_ITEM,
    CREATE_UPDATE, DELETE_GROUP, GROUP_ITEMS, LIST_BOARDS, NEXT_DETAIL_ITEMS, NEXT_ITEMS,
};

const API_VERSION_HEADER: &str = "API-Version";
const API_VERSION: &str = "2024-10";

/// Multipart part name the file endpoint binds to the `$file` variable.
const FILE_PART: &str = "variables[file]";

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// One request body, kept so it can be sent again after a rate limit.
enum Payload<'a> {
    Query { query: &'a str, variables: Value },
    File { query: String, file_name: String, bytes: Vec<u8> },
}

/// Talks to the monday.com API on behalf of any number of workspaces; the
/// token travels with each call.
pub struct MondayClient {
    http: reqwest::Client,
    config: MondayConfig,
}

impl MondayClient {
    /// # Errors
    ///
    /// Returns [`MondayError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: MondayConfig) -> Result<Self, MondayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| MondayError::ClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MondayConfig {
        &self.config
    }

    async fn execute(
        &self,
        operation: &'static str,
        token: &AccessToken,
        payload: &Payload<'_>,
    ) -> Result<Value, MondayError> {
        let mut retries = 0;
        loop {
            match self.send_once(operation, token, payload).await {
                Err(MondayError::RateLimited { retry_after }) if retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        operation,
                        retry = retries,
                        delay_secs = retry_after.as_secs(),
                        "rate limited; backing off"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        operation: &'static str,
        token: &AccessToken,
        payload: &Payload<'_>,
    ) -> Result<Value, MondayError> {
        let request = match payload {
            Payload::Query { query, variables } => self
                .http
                .post(&self.config.api_url)
                .json(&GraphQlRequest { query: *query, variables }),
            Payload::File { query, file_name, bytes } => {
                let form = Form::new()
                    .text("query", query.clone())
                    .part(FILE_PART, Part::bytes(bytes.clone()).file_name(file_name.clone()));
                self.http.post(&self.config.file_api_url).multipart(form)
            }
        };

        let response = request
            .header(AUTHORIZATION, token.expose())
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!(operation, status, bytes = body.len(), "response received");

        classify_response(status, &body)
    }

    async fn query(
        &self,
        operation: &'static str,
        token: &AccessToken,
        query: &str,
        variables: Value,
    ) -> Result<Value, MondayError> {
        self.execute(operation, token, &Payload::Query { query, variables }).await
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    async fn group_items(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<Vec<RemoteItem>, MondayError> {
        let variables = json!({
            "board": [board.as_str()],
            "group": [group.as_str()],
            "limit": self.config.page_size,
        });
        let data = self.query("group_items", token, GROUP_ITEMS, variables).await?;
        let Boards { boards } = decode::<Boards<GroupItemsBoard>>(data)?;
        let found = boards
            .into_iter()
            .next()
            .ok_or_else(|| MondayError::NotFound { what: format!("board {board}") })?;
        let mut page = found
            .groups
            .into_iter()
            .next()
            .ok_or_else(|| MondayError::NotFound { what: format!("group {group} on board {board}") })?
            .items_page;

        let mut items = Vec::new();
        loop {
            for record in page.items {
                items.push(to_remote_item(record)?);
            }
            let Some(cursor) = page.cursor else {
                break;
            };
            let variables = json!({ "cursor": cursor, "limit": self.config.page_size });
            let data = self.query("next_items", token, NEXT_ITEMS, variables).await?;
            page = decode::<NextItemsPage<IdName>>(data)?.next_items_page;
        }
        debug!(board = %board, group = %group, items = items.len(), "group listed");
        Ok(items)
    }

    async fn board_groups(
        &self,
        token: &AccessToken,
        board: &BoardId,
    ) -> Result<Vec<RemoteGroup>, MondayError> {
        let variables = json!({ "board": [board.as_str()] });
        let data = self.query("board_groups", token, BOARD_GROUPS, variables).await?;
        let Boards { boards } = decode::<Boards<BoardGroups>>(data)?;
        let found = boards
            .into_iter()
            .next()
            .ok_or_else(|| MondayError::NotFound { what: format!("board {board}") })?;
        found.groups.into_iter().map(to_remote_group).collect()
    }

    async fn workspace_boards(
        &self,
        token: &AccessToken,
        workspace: &str,
    ) -> Result<Vec<RemoteBoard>, MondayError> {
        let variables = json!({ "limit": self.config.boards_limit });
        let data = self.query("list_boards", token, LIST_BOARDS, variables).await?;
        let listing = decode::<Boards<BoardSummary>>(data)?.boards;

        let mut boards = Vec::new();
        for summary in listing {
            if !summary.workspace.as_ref().is_some_and(|w| w.name == workspace) {
                continue;
            }
            debug!(board = %summary.name, id = %summary.id, "loading board");
            boards.push(self.board_detail(token, &summary.id).await?);
        }
        Ok(boards)
    }

    async fn board_detail(&self, token: &AccessToken, board: &str) -> Result<RemoteBoard, MondayError> {
        let variables = json!({ "board": [board], "limit": self.config.page_size });
        let data = self.query("board_detail", token, BOARD_DETAIL, variables).await?;
        let detail = decode::<Boards<BoardDetail>>(data)?
            .boards
            .into_iter()
            .next()
            .ok_or_else(|| MondayError::NotFound { what: format!("board {board}") })?;

        let mut more: Vec<ItemRecord> = Vec::new();
        let mut cursor = detail.items_page.cursor.clone();
        while let Some(next) = cursor {
            let variables = json!({ "cursor": next, "limit": self.config.page_size });
            let data = self.query("next_detail_items", token, NEXT_DETAIL_ITEMS, variables).await?;
            let page = decode::<NextItemsPage<ItemRecord>>(data)?.next_items_page;
            more.extend(page.items);
            cursor = page.cursor;
        }
        to_remote_board(detail, more)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    async fn mutate(
        &self,
        operation: &'static str,
        token: &AccessToken,
        document: &str,
        variables: Value,
    ) -> Result<String, MondayError> {
        let data = self.query(operation, token, document, variables).await?;
        mutation_id(&data, operation)
    }

    async fn add_file(
        &self,
        token: &AccessToken,
        item: &ItemId,
        column: &ColumnId,
        path: &Path,
    ) -> Result<AssetId, MondayError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| MondayError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| MondayError::File {
                path: path.to_path_buf(),
                message: "path has no file name".into(),
            })?;
        debug!(item = %item, column = %column, file = %file_name, size = bytes.len(), "uploading file");

        let payload = Payload::File { query: add_file_document(item, column), file_name, bytes };
        let data = self.execute("add_file_to_column", token, &payload).await?;
        parse_id(mutation_id(&data, "add_file_to_column")?, "asset", AssetId::new)
    }
}

impl std::fmt::Debug for MondayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayClient").field("config", &self.config).finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Port implementations
// ----------------------------------------------------------------------------

#[async_trait]
impl SnapshotProvider for MondayClient {
    async fn fetch_group_items(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<Vec<RemoteItem>, RemoteFetchError> {
        Ok(self.group_items(token, board, group).await?)
    }

    async fn fetch_board_groups(
        &self,
        token: &AccessToken,
        board: &BoardId,
    ) -> Result<Vec<RemoteGroup>, RemoteFetchError> {
        Ok(self.board_groups(token, board).await?)
    }

    async fn fetch_workspace_boards(
        &self,
        token: &AccessToken,
        workspace: &str,
    ) -> Result<Vec<RemoteBoard>, RemoteFetchError> {
        Ok(self.workspace_boards(token, workspace).await?)
    }
}

#[async_trait]
impl MutationProvider for MondayClient {
    async fn create_board(
        &self,
        token: &AccessToken,
        name: &str,
        workspace: Option<&WorkspaceId>,
    ) -> Result<BoardId, RemoteWriteError> {
        let variables = json!({ "name": name, "workspace": workspace.map(WorkspaceId::as_str) });
        let id = self.mutate("create_board", token, CREATE_BOARD, variables).await?;
        Ok(parse_id(id, "board", BoardId::new)?)
    }

    async fn delete_group(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<(), RemoteWriteError> {
        let variables = json!({ "board": board.as_str(), "group": group.as_str() });
        self.mutate("delete_group", token, DELETE_GROUP, variables).await?;
        Ok(())
    }

    async fn create_group(
        &self,
        token: &AccessToken,
        board: &BoardId,
        title: &str,
    ) -> Result<GroupId, RemoteWriteError> {
        let variables = json!({ "board": board.as_str(), "name": title });
        let id = self.mutate("create_group", token, CREATE_GROUP, variables).await?;
        Ok(parse_id(id, "group", GroupId::new)?)
    }

    async fn create_column(
        &self,
        token: &AccessToken,
        board: &BoardId,
        title: &str,
        description: &str,
        column_type: ColumnType,
    ) -> Result<ColumnId, RemoteWriteError> {
        let variables = json!({
            "board": board.as_str(),
            "title": title,
            "description": description,
            "type": column_type.api_name(),
        });
        let id = self.mutate("create_column", token, CREATE_COLUMN, variables).await?;
        Ok(parse_id(id, "column", ColumnId::new)?)
    }

    async fn create_item(
        &self,
        token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
        name: &str,
        values: &[(ColumnId, ColumnValue)],
    ) -> Result<ItemId, RemoteWriteError> {
        let variables = json!({
            "board": board.as_str(),
            "group": group.as_str(),
            "name": name,
            "values": encode_column_values(values),
        });
        let id = self.mutate("create_item", token, CREATE_ITEM, variables).await?;
        Ok(parse_id(id, "item", ItemId::new)?)
    }

    async fn change_column_value(
        &self,
        token: &AccessToken,
        board: &BoardId,
        item: &ItemId,
        column: &ColumnId,
        value: &ColumnValue,
    ) -> Result<(), RemoteWriteError> {
        let variables = json!({
            "board": board.as_str(),
            "item": item.as_str(),
            "column": column.as_str(),
            "value": encode_value_argument(value),
        });
        self.mutate("change_column_value", token, CHANGE_COLUMN_VALUE, variables).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        token: &AccessToken,
        item: &ItemId,
        column: &ColumnId,
        path: &Path,
    ) -> Result<AssetId, RemoteWriteError> {
        Ok(self.add_file(token, item, column, path).await?)
    }

    async fn create_update(
        &self,
        token: &AccessToken,
        item: &ItemId,
        body: &str,
    ) -> Result<UpdateId, RemoteWriteError> {
        let variables = json!({ "item": item.as_str(), "body": body });
        let id = self.mutate("create_update", token, CREATE_UPDATE, variables).await?;
        Ok(parse_id(id, "update", UpdateId::new)?)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
