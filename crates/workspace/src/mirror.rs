//! Workspace mirror: an owned, typed graph of the remote workspace.
//!
//! DESIGN
//! ======
//! `Workspace -> Board -> {Column, Group} -> Item`, each level exclusively
//! owning the next through maps keyed by title (or item name). There are no
//! back-references: every board carries a clone of the workspace's
//! [`RemoteHandle`], which is all it needs to issue its own mutations.
//!
//! The mirror is the local source of truth for everything created through it.
//! Boards that already exist remotely are hydrated once, at `connect`.
//!
//! ERROR HANDLING
//! ==============
//! Local checks (duplicate titles, unknown columns, value/type mismatches)
//! run before any remote call. A failed remote call leaves the mirror exactly
//! as it was.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use model::{
    AssetId, BoardId, ColumnId, ColumnType, ColumnValue, ColumnValueError, GroupId, ItemId,
    RemoteBoard, RemoteFetchError, RemoteWriteError, UpdateId, WorkspaceId,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::ExecutionMapping;
use crate::input_board::{BoardState, InputBoard, InputBoardConfig, STATUS_COLUMN_TITLE};
use crate::remote::RemoteHandle;

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("workspace '{name}' has no boards; the remote does not recognise empty workspaces")]
    EmptyWorkspace { name: String },

    #[error("board '{name}' already exists")]
    DuplicateBoard { name: String },

    #[error("board '{name}' not found")]
    UnknownBoard { name: String },

    #[error("group '{title}' already exists on board '{board}'")]
    DuplicateGroup { board: String, title: String },

    #[error("group '{title}' not found on board '{board}'")]
    UnknownGroup { board: String, title: String },

    #[error("column '{title}' already exists on board '{board}'")]
    DuplicateColumn { board: String, title: String },

    #[error("column '{title}' not found on board '{board}'")]
    UnknownColumn { board: String, title: String },

    #[error("item '{name}' already exists in group '{group}'")]
    DuplicateItem { group: String, name: String },

    #[error("item '{name}' not found in group '{group}'")]
    UnknownItem { group: String, name: String },

    #[error("column '{column}' is a {found} column, not a file column")]
    NotAFileColumn { column: String, found: ColumnType },

    #[error(transparent)]
    InvalidValue(#[from] ColumnValueError),

    #[error("remote read failed: {0}")]
    Fetch(#[from] RemoteFetchError),

    #[error("remote write failed: {0}")]
    Write(#[from] RemoteWriteError),
}

// ----------------------------------------------------------------------------
// Columns, items and groups
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    id: ColumnId,
    title: String,
    description: String,
    column_type: ColumnType,
}

impl Column {
    pub fn id(&self) -> &ColumnId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    id: ItemId,
    name: String,
    /// Typed values written through the mirror, keyed by column title.
    values: BTreeMap<String, ColumnValue>,
    /// Display text of cells as hydrated from the remote, keyed by column title.
    display: BTreeMap<String, String>,
    /// Assets uploaded through the mirror, keyed by file column title.
    files: BTreeMap<String, Vec<AssetId>>,
    updates: Vec<UpdateId>,
}

impl Item {
    fn new(id: ItemId, name: String) -> Self {
        Self {
            id,
            name,
            values: BTreeMap::new(),
            display: BTreeMap::new(),
            files: BTreeMap::new(),
            updates: Vec::new(),
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, column: &str) -> Option<&ColumnValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &BTreeMap<String, ColumnValue> {
        &self.values
    }

    pub fn display_text(&self, column: &str) -> Option<&str> {
        self.display.get(column).map(String::as_str)
    }

    pub fn files(&self, column: &str) -> &[AssetId] {
        self.files.get(column).map_or(&[], Vec::as_slice)
    }

    pub fn updates(&self) -> &[UpdateId] {
        &self.updates
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    id: GroupId,
    title: String,
    items: BTreeMap<String, Item>,
}

impl Group {
    fn new(id: GroupId, title: String) -> Self {
        Self { id, title, items: BTreeMap::new() }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Board
// ----------------------------------------------------------------------------

/// A mirrored board: its columns and groups, and the handle used to mutate it.
#[derive(Debug, Clone)]
pub struct Board {
    id: BoardId,
    name: String,
    remote: RemoteHandle,
    columns: BTreeMap<String, Column>,
    groups: BTreeMap<String, Group>,
}

impl Board {
    /// Creates a board remotely and removes the default groups the remote
    /// seeds new boards with, so the mirror starts from an empty board.
    async fn create(
        remote: RemoteHandle,
        name: &str,
        workspace: Option<&WorkspaceId>,
    ) -> Result<Self, MirrorError> {
        let id = remote.writer().create_board(remote.token(), name, workspace).await?;
        let defaults = remote.reader().fetch_board_groups(remote.token(), &id).await?;
        for group in &defaults {
            remote.writer().delete_group(remote.token(), &id, &group.id).await?;
        }
        info!(board = name, %id, removed_groups = defaults.len(), "board created");

        Ok(Self {
            id,
            name: name.to_string(),
            remote,
            columns: BTreeMap::new(),
            groups: BTreeMap::new(),
        })
    }

    fn hydrate(remote: RemoteHandle, record: RemoteBoard) -> Self {
        let mut columns = BTreeMap::new();
        let mut column_titles: HashMap<ColumnId, String> = HashMap::new();
        for column in record.columns {
            column_titles.insert(column.id.clone(), column.title.clone());
            let Some(column_type) = column.column_type else {
                debug!(board = %record.name, column = %column.title, "unsupported column type; not mirrored");
                continue;
            };
            columns.insert(
                column.title.clone(),
                Column {
                    id: column.id,
                    title: column.title,
                    description: column.description,
                    column_type,
                },
            );
        }

        let mut groups = BTreeMap::new();
        let mut group_titles: HashMap<GroupId, String> = HashMap::new();
        for group in record.groups {
            group_titles.insert(group.id.clone(), group.title.clone());
            groups.insert(group.title.clone(), Group::new(group.id, group.title));
        }

        for record_item in record.items {
            let Some(group) = group_titles
                .get(&record_item.group_id)
                .and_then(|title| groups.get_mut(title))
            else {
                continue;
            };
            let mut item = Item::new(record_item.id, record_item.name);
            for (column_id, text) in record_item.cells {
                let key = column_titles
                    .get(&column_id)
                    .cloned()
                    .unwrap_or_else(|| column_id.to_string());
                item.display.insert(key, text);
            }
            if group.items.contains_key(&item.name) {
                debug!(group = %group.title, item = %item.name, "duplicate item name on remote; keeping first");
                continue;
            }
            group.items.insert(item.name.clone(), item);
        }

        Self { id: record.id, name: record.name, remote, columns, groups }
    }

    pub fn id(&self) -> &BoardId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote(&self) -> &RemoteHandle {
        &self.remote
    }

    pub fn column(&self, title: &str) -> Option<&Column> {
        self.columns.get(title)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn group(&self, title: &str) -> Option<&Group> {
        self.groups.get(title)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Creates a group on this board.
    ///
    /// # Errors
    ///
    /// [`MirrorError::DuplicateGroup`] if the title is taken, or the remote
    /// write error.
    pub async fn add_group(&mut self, title: &str) -> Result<&Group, MirrorError> {
        if self.groups.contains_key(title) {
            return Err(MirrorError::DuplicateGroup { board: self.name.clone(), title: title.to_string() });
        }
        let id = self.remote.writer().create_group(self.remote.token(), &self.id, title).await?;
        debug!(board = %self.name, group = title, %id, "group created");
        Ok(self
            .groups
            .entry(title.to_string())
            .or_insert_with(|| Group::new(id, title.to_string())))
    }

    /// Creates a column on this board.
    ///
    /// # Errors
    ///
    /// [`MirrorError::DuplicateColumn`] if the title is taken, or the remote
    /// write error.
    pub async fn add_column(
        &mut self,
        title: &str,
        description: &str,
        column_type: ColumnType,
    ) -> Result<&Column, MirrorError> {
        if self.columns.contains_key(title) {
            return Err(MirrorError::DuplicateColumn { board: self.name.clone(), title: title.to_string() });
        }
        let id = self
            .remote
            .writer()
            .create_column(self.remote.token(), &self.id, title, description, column_type)
            .await?;
        debug!(board = %self.name, column = title, %column_type, %id, "column created");
        Ok(self.columns.entry(title.to_string()).or_insert_with(|| Column {
            id,
            title: title.to_string(),
            description: description.to_string(),
            column_type,
        }))
    }

    /// Creates an item in a group with initial values keyed by column title.
    ///
    /// Every value is validated against its column before the remote call.
    ///
    /// # Errors
    ///
    /// Unknown group or column, duplicate item name, invalid value, or the
    /// remote write error.
    pub async fn add_item(
        &mut self,
        group: &str,
        name: &str,
        values: Vec<(String, ColumnValue)>,
    ) -> Result<&Item, MirrorError> {
        let group_id = self.group_ref(group)?.id.clone();
        if self.group_ref(group)?.items.contains_key(name) {
            return Err(MirrorError::DuplicateItem { group: group.to_string(), name: name.to_string() });
        }

        let mut wire = Vec::with_capacity(values.len());
        for (title, value) in &values {
            let column = self.column_ref(title)?;
            value.validate_for(title, column.column_type)?;
            wire.push((column.id.clone(), value.clone()));
        }

        let id = self
            .remote
            .writer()
            .create_item(self.remote.token(), &self.id, &group_id, name, &wire)
            .await?;
        debug!(board = %self.name, group, item = name, %id, "item created");

        let mut item = Item::new(id, name.to_string());
        item.values.extend(values);
        let group = self.group_mut(group)?;
        Ok(group.items.entry(name.to_string()).or_insert(item))
    }

    /// Overwrites one cell of an item.
    ///
    /// # Errors
    ///
    /// Unknown group, item or column, invalid value, or the remote write error.
    pub async fn set_value(
        &mut self,
        group: &str,
        item: &str,
        column: &str,
        value: ColumnValue,
    ) -> Result<(), MirrorError> {
        let item_id = self.item_ref(group, item)?.id.clone();
        let column_ref = self.column_ref(column)?;
        value.validate_for(column, column_ref.column_type)?;
        let column_id = column_ref.id.clone();

        self.remote
            .writer()
            .change_column_value(self.remote.token(), &self.id, &item_id, &column_id, &value)
            .await?;
        self.item_mut(group, item)?.values.insert(column.to_string(), value);
        Ok(())
    }

    /// Sets a link cell. An empty `description` displays the URL itself.
    ///
    /// # Errors
    ///
    /// See [`Board::set_value`].
    pub async fn add_link(
        &mut self,
        group: &str,
        item: &str,
        column: &str,
        url: &str,
        description: &str,
    ) -> Result<(), MirrorError> {
        self.set_value(group, item, column, ColumnValue::link(url, description)).await
    }

    /// Sets a rating cell (1 to 5 stars).
    ///
    /// # Errors
    ///
    /// See [`Board::set_value`].
    pub async fn set_rating(
        &mut self,
        group: &str,
        item: &str,
        column: &str,
        stars: u8,
    ) -> Result<(), MirrorError> {
        self.set_value(group, item, column, ColumnValue::Rating { stars }).await
    }

    /// Uploads files into a file column, one request per file, in order.
    ///
    /// Files uploaded before a failure stay recorded on the item.
    ///
    /// # Errors
    ///
    /// Unknown group, item or column, a non-file column, or the first remote
    /// write error.
    pub async fn upload_files<P: AsRef<Path>>(
        &mut self,
        group: &str,
        item: &str,
        column: &str,
        paths: &[P],
    ) -> Result<Vec<AssetId>, MirrorError> {
        let item_id = self.item_ref(group, item)?.id.clone();
        let column_ref = self.column_ref(column)?;
        if column_ref.column_type != ColumnType::File {
            return Err(MirrorError::NotAFileColumn {
                column: column.to_string(),
                found: column_ref.column_type,
            });
        }
        let column_id = column_ref.id.clone();

        let mut uploaded = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let result = self
                .remote
                .writer()
                .upload_file(self.remote.token(), &item_id, &column_id, path)
                .await;
            match result {
                Ok(asset) => {
                    debug!(item, column, path = %path.display(), %asset, "file uploaded");
                    self.item_mut(group, item)?
                        .files
                        .entry(column.to_string())
                        .or_default()
                        .push(asset.clone());
                    uploaded.push(asset);
                }
                Err(e) => {
                    warn!(item, column, path = %path.display(), error = %e, "file upload failed");
                    return Err(e.into());
                }
            }
        }
        Ok(uploaded)
    }

    /// Posts an update (comment) on an item.
    ///
    /// # Errors
    ///
    /// Unknown group or item, or the remote write error.
    pub async fn add_update(&mut self, group: &str, item: &str, body: &str) -> Result<UpdateId, MirrorError> {
        let item_id = self.item_ref(group, item)?.id.clone();
        let update = self
            .remote
            .writer()
            .create_update(self.remote.token(), &item_id, body)
            .await?;
        self.item_mut(group, item)?.updates.push(update.clone());
        Ok(update)
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    fn group_ref(&self, title: &str) -> Result<&Group, MirrorError> {
        self.groups
            .get(title)
            .ok_or_else(|| MirrorError::UnknownGroup { board: self.name.clone(), title: title.to_string() })
    }

    fn group_mut(&mut self, title: &str) -> Result<&mut Group, MirrorError> {
        let board = &self.name;
        self.groups
            .get_mut(title)
            .ok_or_else(|| MirrorError::UnknownGroup { board: board.clone(), title: title.to_string() })
    }

    fn column_ref(&self, title: &str) -> Result<&Column, MirrorError> {
        self.columns
            .get(title)
            .ok_or_else(|| MirrorError::UnknownColumn { board: self.name.clone(), title: title.to_string() })
    }

    fn item_ref(&self, group: &str, name: &str) -> Result<&Item, MirrorError> {
        self.group_ref(group)?
            .items
            .get(name)
            .ok_or_else(|| MirrorError::UnknownItem { group: group.to_string(), name: name.to_string() })
    }

    fn item_mut(&mut self, group: &str, name: &str) -> Result<&mut Item, MirrorError> {
        self.group_mut(group)?
            .items
            .get_mut(name)
            .ok_or_else(|| MirrorError::UnknownItem { group: group.to_string(), name: name.to_string() })
    }
}

// ----------------------------------------------------------------------------
// Workspace
// ----------------------------------------------------------------------------

/// A remote workspace and every board mirrored from it.
#[derive(Debug)]
pub struct Workspace {
    name: String,
    id: Option<WorkspaceId>,
    remote: RemoteHandle,
    boards: BTreeMap<String, Board>,
    input_boards: BTreeMap<String, InputBoard>,
}

impl Workspace {
    /// Hydrates the mirror from every remote board in the workspace `name`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::EmptyWorkspace`] if the remote reports no boards for the
    /// workspace, or the remote read error.
    pub async fn connect(name: &str, remote: RemoteHandle) -> Result<Self, MirrorError> {
        let records = remote.reader().fetch_workspace_boards(remote.token(), name).await?;
        if records.is_empty() {
            return Err(MirrorError::EmptyWorkspace { name: name.to_string() });
        }

        let id = records.iter().find_map(|r| r.workspace_id.clone());
        let mut boards = BTreeMap::new();
        for record in records {
            if boards.contains_key(&record.name) {
                warn!(workspace = name, board = %record.name, "duplicate board name on remote; keeping first");
                continue;
            }
            let board = Board::hydrate(remote.clone(), record);
            boards.insert(board.name.clone(), board);
        }

        info!(workspace = name, boards = boards.len(), "workspace mirrored");
        Ok(Self { name: name.to_string(), id, remote, boards, input_boards: BTreeMap::new() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&WorkspaceId> {
        self.id.as_ref()
    }

    pub fn remote(&self) -> &RemoteHandle {
        &self.remote
    }

    /// Looks up a board by name, including the boards behind input boards.
    pub fn board(&self, name: &str) -> Option<&Board> {
        self.boards
            .get(name)
            .or_else(|| self.input_boards.get(name).map(InputBoard::board))
    }

    pub fn board_mut(&mut self, name: &str) -> Option<&mut Board> {
        match self.boards.get_mut(name) {
            Some(board) => Some(board),
            None => self.input_boards.get_mut(name).map(InputBoard::board_mut),
        }
    }

    /// Names of every mirrored board, input boards included.
    pub fn board_names(&self) -> impl Iterator<Item = &str> {
        self.boards.keys().chain(self.input_boards.keys()).map(String::as_str)
    }

    pub fn input_board(&self, name: &str) -> Option<&InputBoard> {
        self.input_boards.get(name)
    }

    pub fn input_board_mut(&mut self, name: &str) -> Option<&mut InputBoard> {
        self.input_boards.get_mut(name)
    }

    pub fn input_boards_mut(&mut self) -> impl Iterator<Item = &mut InputBoard> {
        self.input_boards.values_mut()
    }

    /// Creates a board in this workspace.
    ///
    /// # Errors
    ///
    /// [`MirrorError::DuplicateBoard`] if the name is taken, or the remote
    /// error.
    pub async fn create_board(&mut self, name: &str) -> Result<&mut Board, MirrorError> {
        self.ensure_board_name_free(name)?;
        let board = Board::create(self.remote.clone(), name, self.id.as_ref()).await?;
        Ok(self.boards.entry(name.to_string()).or_insert(board))
    }

    /// Creates a new board and wraps it as an input board.
    ///
    /// # Errors
    ///
    /// See [`Workspace::create_board`]; also fails if the status column cannot
    /// be created.
    pub async fn create_input_board(
        &mut self,
        name: &str,
        mapping: ExecutionMapping,
        config: InputBoardConfig,
    ) -> Result<&mut InputBoard, MirrorError> {
        self.ensure_board_name_free(name)?;
        let mut board = Board::create(self.remote.clone(), name, self.id.as_ref()).await?;
        if config.track_status {
            board.add_column(STATUS_COLUMN_TITLE, "", ColumnType::Status).await?;
        }
        let input = InputBoard::new(board, mapping, config);
        Ok(self.input_boards.entry(name.to_string()).or_insert(input))
    }

    /// Turns an existing mirrored board into an input board.
    ///
    /// # Errors
    ///
    /// [`MirrorError::UnknownBoard`] if no plain board has that name, or the
    /// status column creation error (the board is left unchanged).
    pub async fn promote_to_input_board(
        &mut self,
        name: &str,
        mapping: ExecutionMapping,
        config: InputBoardConfig,
    ) -> Result<&mut InputBoard, MirrorError> {
        let board = self
            .boards
            .get_mut(name)
            .ok_or_else(|| MirrorError::UnknownBoard { name: name.to_string() })?;
        if config.track_status && board.column(STATUS_COLUMN_TITLE).is_none() {
            board.add_column(STATUS_COLUMN_TITLE, "", ColumnType::Status).await?;
        }

        let board = self
            .boards
            .remove(name)
            .ok_or_else(|| MirrorError::UnknownBoard { name: name.to_string() })?;
        let input = InputBoard::new(board, mapping, config);
        Ok(self.input_boards.entry(name.to_string()).or_insert(input))
    }

    /// Turns a stopped or never-started input board back into a plain board.
    ///
    /// Returns `None` if there is no such input board or it is running.
    pub fn demote_input_board(&mut self, name: &str) -> Option<&mut Board> {
        let running = self
            .input_boards
            .get(name)
            .map(|b| b.state() == BoardState::Running)?;
        if running {
            return None;
        }
        let board = self.input_boards.remove(name)?.into_board();
        Some(self.boards.entry(name.to_string()).or_insert(board))
    }

    fn ensure_board_name_free(&self, name: &str) -> Result<(), MirrorError> {
        if self.boards.contains_key(name) || self.input_boards.contains_key(name) {
            Err(MirrorError::DuplicateBoard { name: name.to_string() })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
