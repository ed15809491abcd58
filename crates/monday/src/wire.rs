//! GraphQL documents, column-value encodings and response shapes.
//!
//! Everything here is pure: documents are constants, values are encoded into
//! `serde_json::Value`, and responses are decoded from the `data` object that
//! [`crate::error::classify_response`] hands back.

use model::{
    BoardId, ColumnId, ColumnType, ColumnValue, GroupId, ItemId, RemoteBoard, RemoteColumn,
    RemoteGroup, RemoteItem, RemoteItemRecord, StatusValue, WorkspaceId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::MondayError;

// ----------------------------------------------------------------------------
// GraphQL documents
// ----------------------------------------------------------------------------

pub(crate) const GROUP_ITEMS: &str = "query ($board: [ID!], $group: [String], $limit: Int!) { \
    boards (ids: $board) { groups (ids: $group) { id items_page (limit: $limit) { cursor items { id name } } } } }";

pub(crate) const NEXT_ITEMS: &str = "query ($cursor: String!, $limit: Int!) { \
    next_items_page (cursor: $cursor, limit: $limit) { cursor items { id name } } }";

pub(crate) const BOARD_GROUPS: &str =
    "query ($board: [ID!]) { boards (ids: $board) { id groups { id title } } }";

pub(crate) const LIST_BOARDS: &str =
    "query ($limit: Int!) { boards (limit: $limit) { id name workspace { id name } } }";

pub(crate) const BOARD_DETAIL: &str = "query ($board: [ID!], $limit: Int!) { \
    boards (ids: $board) { id name workspace { id name } groups { id title } \
    columns { id title type description } \
    items_page (limit: $limit) { cursor items { id name group { id } column_values { id text } } } } }";

pub(crate) const NEXT_DETAIL_ITEMS: &str = "query ($cursor: String!, $limit: Int!) { \
    next_items_page (cursor: $cursor, limit: $limit) { cursor items { id name group { id } column_values { id text } } } }";

pub(crate) const CREATE_BOARD: &str = "mutation ($name: String!, $workspace: ID) { \
    create_board (board_name: $name, board_kind: private, workspace_id: $workspace) { id } }";

pub(crate) const DELETE_GROUP: &str = "mutation ($board: ID!, $group: String!) { \
    delete_group (board_id: $board, group_id: $group) { id } }";

pub(crate) const CREATE_GROUP: &str = "mutation ($board: ID!, $name: String!) { \
    create_group (board_id: $board, group_name: $name) { id } }";

pub(crate) const CREATE_COLUMN: &str =
    "mutation ($board: ID!, $title: String!, $description: String, $type: ColumnType!) { \
    create_column (board_id: $board, title: $title, description: $description, column_type: $type) { id } }";

pub(crate) const CREATE_ITEM: &str =
    "mutation ($board: ID!, $group: String!, $name: String!, $values: JSON) { \
    create_item (board_id: $board, group_id: $group, item_name: $name, column_values: $values) { id } }";

pub(crate) const CHANGE_COLUMN_VALUE: &str =
    "mutation ($board: ID!, $item: ID!, $column: String!, $value: JSON!) { \
    change_column_value (board_id: $board, item_id: $item, column_id: $column, value: $value) { id } }";

pub(crate) const CREATE_UPDATE: &str =
    "mutation ($item: ID!, $body: String!) { create_update (item_id: $item, body: $body) { id } }";

/// The file endpoint takes the file as the `$file` variable of a multipart
/// request; the remaining arguments are inlined as escaped string literals.
pub(crate) fn add_file_document(item: &ItemId, column: &ColumnId) -> String {
    format!(
        "mutation ($file: File!) {{ add_file_to_column (file: $file, item_id: {}, column_id: {}) {{ id }} }}",
        graphql_string(item.as_str()),
        graphql_string(column.as_str()),
    )
}

fn graphql_string(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: &'a Value,
}

// ----------------------------------------------------------------------------
// Column values
// ----------------------------------------------------------------------------

/// The JSON a column of the value's type expects.
pub(crate) fn encode_value(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Text { text } => Value::String(text.clone()),
        ColumnValue::LongText { text } => json!({ "text": text }),
        ColumnValue::Number { value } => Value::String(value.to_string()),
        ColumnValue::Date { date } => json!({ "date": date.to_string() }),
        ColumnValue::Status { status: StatusValue::Index(index) } => json!({ "index": index }),
        ColumnValue::Status { status: StatusValue::Label(label) } => json!({ "label": label }),
        ColumnValue::Link { url, text } => json!({ "url": url, "text": text }),
        ColumnValue::Rating { stars } => json!({ "rating": stars }),
        ColumnValue::Checkbox { checked: true } => json!({ "checked": "true" }),
        ColumnValue::Checkbox { checked: false } => Value::Null,
        ColumnValue::Email { address, text } => json!({ "email": address, "text": text }),
    }
}

/// `change_column_value` takes its value as a JSON-encoded string.
pub(crate) fn encode_value_argument(value: &ColumnValue) -> String {
    encode_value(value).to_string()
}

/// `create_item` takes every initial value in one JSON-encoded object keyed by
/// column id. `None` when there are no values.
pub(crate) fn encode_column_values(values: &[(ColumnId, ColumnValue)]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let map: Map<String, Value> = values
        .iter()
        .map(|(column, value)| (column.to_string(), encode_value(value)))
        .collect();
    Some(Value::Object(map).to_string())
}

// ----------------------------------------------------------------------------
// Response shapes
// ----------------------------------------------------------------------------

pub(crate) fn decode<T: DeserializeOwned>(data: Value) -> Result<T, MondayError> {
    serde_json::from_value(data).map_err(|e| MondayError::Decode(e.to_string()))
}

/// Pulls `data.<field>.id` out of a mutation response.
pub(crate) fn mutation_id(data: &Value, field: &str) -> Result<String, MondayError> {
    match data.get(field).and_then(|payload| payload.get("id")) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(MondayError::Decode(format!("missing {field}.id"))),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Boards<T> {
    pub boards: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextItemsPage<T> {
    pub next_items_page: ItemsPage<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsPage<T> {
    pub cursor: Option<String>,
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdName {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupItemsBoard {
    pub groups: Vec<GroupItems>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupItems {
    pub items_page: ItemsPage<IdName>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardGroups {
    pub groups: Vec<IdTitle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdTitle {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardSummary {
    pub id: String,
    pub name: String,
    pub workspace: Option<IdName>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardDetail {
    pub id: String,
    pub name: String,
    pub workspace: Option<IdName>,
    pub groups: Vec<IdTitle>,
    pub columns: Vec<ColumnRecord>,
    pub items_page: ItemsPage<ItemRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColumnRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemRecord {
    pub id: String,
    pub name: String,
    pub group: Option<GroupRef>,
    #[serde(default)]
    pub column_values: Vec<CellRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CellRecord {
    pub id: String,
    pub text: Option<String>,
}

// ----------------------------------------------------------------------------
// Conversions into port records
// ----------------------------------------------------------------------------

pub(crate) fn parse_id<T>(
    raw: String,
    what: &str,
    make: impl FnOnce(String) -> Option<T>,
) -> Result<T, MondayError> {
    make(raw).ok_or_else(|| MondayError::Decode(format!("empty {what} id")))
}

pub(crate) fn to_remote_item(record: IdName) -> Result<RemoteItem, MondayError> {
    Ok(RemoteItem { id: parse_id(record.id, "item", ItemId::new)?, name: record.name })
}

pub(crate) fn to_remote_group(record: IdTitle) -> Result<RemoteGroup, MondayError> {
    Ok(RemoteGroup { id: parse_id(record.id, "group", GroupId::new)?, title: record.title })
}

/// Older accounts report status columns as `color`.
fn column_type(api_name: &str) -> Option<ColumnType> {
    match api_name {
        "color" => Some(ColumnType::Status),
        other => ColumnType::from_api_name(other),
    }
}

/// Builds a board record from its detail response plus the items of any
/// further pages.
pub(crate) fn to_remote_board(
    detail: BoardDetail,
    more_items: Vec<ItemRecord>,
) -> Result<RemoteBoard, MondayError> {
    let workspace_id = detail.workspace.and_then(|w| WorkspaceId::new(w.id));

    let groups = detail
        .groups
        .into_iter()
        .map(to_remote_group)
        .collect::<Result<Vec<_>, _>>()?;

    let columns = detail
        .columns
        .into_iter()
        .map(|c| {
            Ok(RemoteColumn {
                column_type: column_type(&c.column_type),
                id: parse_id(c.id, "column", ColumnId::new)?,
                title: c.title,
                description: c.description.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, MondayError>>()?;

    let items = detail.items_page.items.into_iter().chain(more_items);
    let mut records = Vec::new();
    for item in items {
        let Some(group) = item.group else {
            continue;
        };
        let cells = item
            .column_values
            .into_iter()
            .filter_map(|cell| {
                let text = cell.text.filter(|t| !t.is_empty())?;
                Some((ColumnId::new(cell.id)?, text))
            })
            .collect();
        records.push(RemoteItemRecord {
            id: parse_id(item.id, "item", ItemId::new)?,
            name: item.name,
            group_id: parse_id(group.id, "group", GroupId::new)?,
            cells,
        });
    }

    Ok(RemoteBoard {
        id: parse_id(detail.id, "board", BoardId::new)?,
        name: detail.name,
        workspace_id,
        groups,
        columns,
        items: records,
    })
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
