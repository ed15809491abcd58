//! In-memory remote used by the unit tests of this crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use model::{
    AccessToken, AssetId, BoardId, ColumnId, ColumnType, ColumnValue, GroupId, HandlerError,
    ItemId, MutationProvider, RemoteBoard, RemoteColumn, RemoteFetchError, RemoteGroup, RemoteItem,
    RemoteWriteError, SnapshotProvider, UpdateId, WorkspaceId,
};

use crate::detector::NewItem;
use crate::dispatch::ItemHandler;
use crate::remote::RemoteHandle;

/// Title of the group the fake seeds every newly created board with.
pub(crate) const DEFAULT_GROUP_TITLE: &str = "Group Title";

pub(crate) fn token() -> AccessToken {
    AccessToken::new("test-token").unwrap()
}

pub(crate) fn board_id(id: &str) -> BoardId {
    BoardId::new(id).unwrap()
}

pub(crate) fn group_id(id: &str) -> GroupId {
    GroupId::new(id).unwrap()
}

pub(crate) fn item_id(id: &str) -> ItemId {
    ItemId::new(id).unwrap()
}

pub(crate) fn column_id(id: &str) -> ColumnId {
    ColumnId::new(id).unwrap()
}

pub(crate) fn item(id: &str, name: &str) -> RemoteItem {
    RemoteItem { id: item_id(id), name: name.to_string() }
}

/// A remote board record with the given `(id, title)` groups and
/// `(id, title, type)` columns and no items.
pub(crate) fn remote_board(
    id: &str,
    name: &str,
    groups: &[(&str, &str)],
    columns: &[(&str, &str, ColumnType)],
) -> RemoteBoard {
    RemoteBoard {
        id: board_id(id),
        name: name.to_string(),
        workspace_id: WorkspaceId::new("ws-1"),
        groups: groups
            .iter()
            .map(|(id, title)| RemoteGroup { id: group_id(id), title: title.to_string() })
            .collect(),
        columns: columns
            .iter()
            .map(|(id, title, column_type)| RemoteColumn {
                id: column_id(id),
                title: title.to_string(),
                description: String::new(),
                column_type: Some(*column_type),
            })
            .collect(),
        items: Vec::new(),
    }
}

/// Handler that records every item it receives.
#[derive(Clone, Default)]
pub(crate) struct RecordingHandler {
    seen: Arc<Mutex<Vec<NewItem>>>,
}

impl RecordingHandler {
    pub(crate) fn seen(&self) -> Vec<NewItem> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.seen().into_iter().map(|item| item.name).collect()
    }
}

#[async_trait]
impl ItemHandler for RecordingHandler {
    async fn handle(&self, item: NewItem) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(item);
        Ok(())
    }
}

/// Polls `condition` every few milliseconds, panicking after five seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 5s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WriteCall {
    CreateBoard { name: String, workspace: Option<WorkspaceId> },
    DeleteGroup { board: BoardId, group: GroupId },
    CreateGroup { board: BoardId, title: String },
    CreateColumn { board: BoardId, title: String, column_type: ColumnType },
    CreateItem { board: BoardId, group: GroupId, name: String, values: Vec<(ColumnId, ColumnValue)> },
    ChangeColumnValue { board: BoardId, item: ItemId, column: ColumnId, value: ColumnValue },
    UploadFile { item: ItemId, column: ColumnId, path: PathBuf },
    CreateUpdate { item: ItemId, body: String },
}

#[derive(Default)]
struct FakeState {
    /// Scripted listings per group; the last entry repeats forever.
    listings: HashMap<GroupId, VecDeque<Result<Vec<RemoteItem>, RemoteFetchError>>>,
    fetches: HashMap<GroupId, usize>,
    board_groups: HashMap<BoardId, Vec<RemoteGroup>>,
    workspaces: HashMap<String, Vec<RemoteBoard>>,
    writes: Vec<WriteCall>,
    failing_writes: Option<RemoteWriteError>,
    failing_uploads: HashSet<PathBuf>,
    next_id: u64,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record(&mut self, call: WriteCall) -> Result<(), RemoteWriteError> {
        if let Some(error) = &self.failing_writes {
            return Err(error.clone());
        }
        self.writes.push(call);
        Ok(())
    }
}

/// In-memory implementation of both remote ports.
#[derive(Default)]
pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
    fetch_delay: Option<Duration>,
}

impl FakeRemote {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A remote whose group fetches each take `delay`.
    pub(crate) fn with_fetch_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { fetch_delay: Some(delay), ..Self::default() })
    }

    pub(crate) fn handle(self: &Arc<Self>) -> RemoteHandle {
        RemoteHandle::from_client(token(), Arc::clone(self))
    }

    /// Replaces the scripted listings of `group`.
    pub(crate) fn script_group(
        &self,
        group: &GroupId,
        responses: Vec<Result<Vec<RemoteItem>, RemoteFetchError>>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.listings.insert(group.clone(), responses.into_iter().collect());
    }

    /// Makes every future fetch of `group` return `items`.
    pub(crate) fn set_group_items(&self, group: &GroupId, items: Vec<RemoteItem>) {
        self.script_group(group, vec![Ok(items)]);
    }

    pub(crate) fn seed_workspace(&self, name: &str, boards: Vec<RemoteBoard>) {
        let mut state = self.state.lock().unwrap();
        for board in &boards {
            state.board_groups.insert(board.id.clone(), board.groups.clone());
        }
        state.workspaces.insert(name.to_string(), boards);
    }

    pub(crate) fn fail_writes(&self, error: Option<RemoteWriteError>) {
        self.state.lock().unwrap().failing_writes = error;
    }

    pub(crate) fn fail_upload_of(&self, path: impl Into<PathBuf>) {
        self.state.lock().unwrap().failing_uploads.insert(path.into());
    }

    pub(crate) fn fetch_count(&self, group: &GroupId) -> usize {
        self.state.lock().unwrap().fetches.get(group).copied().unwrap_or(0)
    }

    pub(crate) fn writes(&self) -> Vec<WriteCall> {
        self.state.lock().unwrap().writes.clone()
    }

    pub(crate) fn groups_of(&self, board: &BoardId) -> Vec<RemoteGroup> {
        self.state.lock().unwrap().board_groups.get(board).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotProvider for FakeRemote {
    async fn fetch_group_items(
        &self,
        _token: &AccessToken,
        _board: &BoardId,
        group: &GroupId,
    ) -> Result<Vec<RemoteItem>, RemoteFetchError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(group.clone()).or_default() += 1;
        let Some(script) = state.listings.get_mut(group) else {
            return Ok(Vec::new());
        };
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    async fn fetch_board_groups(
        &self,
        _token: &AccessToken,
        board: &BoardId,
    ) -> Result<Vec<RemoteGroup>, RemoteFetchError> {
        self.state
            .lock()
            .unwrap()
            .board_groups
            .get(board)
            .cloned()
            .ok_or_else(|| RemoteFetchError::NotFound { what: format!("board {board}") })
    }

    async fn fetch_workspace_boards(
        &self,
        _token: &AccessToken,
        workspace: &str,
    ) -> Result<Vec<RemoteBoard>, RemoteFetchError> {
        Ok(self.state.lock().unwrap().workspaces.get(workspace).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MutationProvider for FakeRemote {
    async fn create_board(
        &self,
        _token: &AccessToken,
        name: &str,
        workspace: Option<&WorkspaceId>,
    ) -> Result<BoardId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::CreateBoard { name: name.to_string(), workspace: workspace.cloned() })?;
        let id = board_id(&state.next("board"));
        let default_group = RemoteGroup { id: group_id(&state.next("topics")), title: DEFAULT_GROUP_TITLE.to_string() };
        state.board_groups.insert(id.clone(), vec![default_group]);
        Ok(id)
    }

    async fn delete_group(
        &self,
        _token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
    ) -> Result<(), RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::DeleteGroup { board: board.clone(), group: group.clone() })?;
        if let Some(groups) = state.board_groups.get_mut(board) {
            groups.retain(|g| &g.id != group);
        }
        Ok(())
    }

    async fn create_group(
        &self,
        _token: &AccessToken,
        board: &BoardId,
        title: &str,
    ) -> Result<GroupId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::CreateGroup { board: board.clone(), title: title.to_string() })?;
        let id = group_id(&state.next("group"));
        state
            .board_groups
            .entry(board.clone())
            .or_default()
            .push(RemoteGroup { id: id.clone(), title: title.to_string() });
        Ok(id)
    }

    async fn create_column(
        &self,
        _token: &AccessToken,
        board: &BoardId,
        title: &str,
        _description: &str,
        column_type: ColumnType,
    ) -> Result<ColumnId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::CreateColumn { board: board.clone(), title: title.to_string(), column_type })?;
        Ok(column_id(&state.next(column_type.api_name())))
    }

    async fn create_item(
        &self,
        _token: &AccessToken,
        board: &BoardId,
        group: &GroupId,
        name: &str,
        values: &[(ColumnId, ColumnValue)],
    ) -> Result<ItemId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::CreateItem {
            board: board.clone(),
            group: group.clone(),
            name: name.to_string(),
            values: values.to_vec(),
        })?;
        Ok(item_id(&state.next("item")))
    }

    async fn change_column_value(
        &self,
        _token: &AccessToken,
        board: &BoardId,
        item: &ItemId,
        column: &ColumnId,
        value: &ColumnValue,
    ) -> Result<(), RemoteWriteError> {
        self.state.lock().unwrap().record(WriteCall::ChangeColumnValue {
            board: board.clone(),
            item: item.clone(),
            column: column.clone(),
            value: value.clone(),
        })
    }

    async fn upload_file(
        &self,
        _token: &AccessToken,
        item: &ItemId,
        column: &ColumnId,
        path: &Path,
    ) -> Result<AssetId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_uploads.contains(path) {
            return Err(RemoteWriteError::File {
                path: path.to_path_buf(),
                message: "No such file or directory".to_string(),
            });
        }
        state.record(WriteCall::UploadFile {
            item: item.clone(),
            column: column.clone(),
            path: path.to_path_buf(),
        })?;
        Ok(AssetId::new(state.next("asset")).unwrap())
    }

    async fn create_update(
        &self,
        _token: &AccessToken,
        item: &ItemId,
        body: &str,
    ) -> Result<UpdateId, RemoteWriteError> {
        let mut state = self.state.lock().unwrap();
        state.record(WriteCall::CreateUpdate { item: item.clone(), body: body.to_string() })?;
        Ok(UpdateId::new(state.next("update")).unwrap())
    }
}
