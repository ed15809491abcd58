//! Newtype domain identifiers.
//!
//! Every remote object that has an identity is represented as a distinct
//! newtype wrapping the identifier string the remote service assigned. This
//! prevents accidentally interchanging, for example, a [`GroupId`] with an
//! [`ItemId`] even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ----------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ----------------------------------------------------------------------------
// Identifiers: remote-assigned
// ----------------------------------------------------------------------------

string_id! {
    /// Identifies a workspace on the remote service.
    ///
    /// The remote only reports a workspace through the boards it contains, so
    /// this is always learned from a hydrated board.
    WorkspaceId
}

string_id! {
    /// Identifies a board. Numeric on the wire, kept opaque here.
    BoardId
}

string_id! {
    /// Identifies a group within a board (e.g. `"topics"`, `"new_group12345"`).
    GroupId
}

string_id! {
    /// Identifies a column within a board (e.g. `"status"`, `"text_mkq1"`).
    ColumnId
}

string_id! {
    /// Identifies an item. Item ids are unique across the whole account, so
    /// two groups never report the same id for different items.
    ItemId
}

string_id! {
    /// Identifies an update (comment) posted on an item.
    UpdateId
}

string_id! {
    /// Identifies an uploaded file asset.
    AssetId
}

// ----------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ----------------------------------------------------------------------------

/// Identifies one handler invocation.
///
/// Generated fresh for every dispatched event and recorded on every log event
/// the invocation produces, so a handler's start, failure, and status update
/// can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Generates a new random dispatch identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
