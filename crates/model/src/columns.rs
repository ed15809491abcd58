//! Column types and typed column values.
//!
//! Every column declares a [`ColumnType`]; every value written to it is a
//! [`ColumnValue`] whose variant must match that type. Validation happens
//! before any remote call so a malformed write never leaves the process.
//!
//! File columns are the exception: they carry no scalar value and are filled
//! by uploading files one at a time (see `MutationProvider::upload_file`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::ColumnValueError;

// ----------------------------------------------------------------------------
// Column types
// ----------------------------------------------------------------------------

/// The fixed set of column types this system can create and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    LongText,
    Numbers,
    Date,
    Status,
    Link,
    File,
    Rating,
    Checkbox,
    Email,
}

impl ColumnType {
    /// Every supported column type.
    pub const ALL: [ColumnType; 10] = [
        Self::Text,
        Self::LongText,
        Self::Numbers,
        Self::Date,
        Self::Status,
        Self::Link,
        Self::File,
        Self::Rating,
        Self::Checkbox,
        Self::Email,
    ];

    /// The remote API's name for this column type.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::Numbers => "numbers",
            Self::Date => "date",
            Self::Status => "status",
            Self::Link => "link",
            Self::File => "file",
            Self::Rating => "rating",
            Self::Checkbox => "checkbox",
            Self::Email => "email",
        }
    }

    /// Parses the remote API's name for a column type.
    ///
    /// Returns `None` for types outside the supported set (e.g. `"people"`,
    /// `"name"`); such columns are not mirrored.
    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.api_name() == name)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

// ----------------------------------------------------------------------------
// Column values
// ----------------------------------------------------------------------------

/// Selection on a status column, either by label index or by label text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusValue {
    Index(u32),
    Label(String),
}

/// A typed value for one column of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnValue {
    Text { text: String },
    LongText { text: String },
    Number { value: f64 },
    Date { date: NaiveDate },
    Status { status: StatusValue },
    /// A hyperlink. `text` is what the cell displays.
    Link { url: String, text: String },
    /// Whole stars, 1 to 5.
    Rating { stars: u8 },
    Checkbox { checked: bool },
    Email { address: String, text: String },
}

impl ColumnValue {
    /// Plain text value.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Link value. An empty description displays the URL itself.
    pub fn link(url: impl Into<String>, description: impl Into<String>) -> Self {
        let url = url.into();
        let description = description.into();
        let text = if description.is_empty() { url.clone() } else { description };
        Self::Link { url, text }
    }

    /// Status value selected by label index.
    pub fn status_index(index: u32) -> Self {
        Self::Status { status: StatusValue::Index(index) }
    }

    /// The column type this value can be written to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Text { .. } => ColumnType::Text,
            Self::LongText { .. } => ColumnType::LongText,
            Self::Number { .. } => ColumnType::Numbers,
            Self::Date { .. } => ColumnType::Date,
            Self::Status { .. } => ColumnType::Status,
            Self::Link { .. } => ColumnType::Link,
            Self::Rating { .. } => ColumnType::Rating,
            Self::Checkbox { .. } => ColumnType::Checkbox,
            Self::Email { .. } => ColumnType::Email,
        }
    }

    /// Checks that this value may be written to a column titled `column` of
    /// type `expected`.
    ///
    /// # Errors
    ///
    /// - [`ColumnValueError::FileColumn`] when `expected` is [`ColumnType::File`].
    /// - [`ColumnValueError::TypeMismatch`] when the variant does not match.
    /// - [`ColumnValueError::RatingOutOfRange`] / [`ColumnValueError::EmptyUrl`]
    ///   for values that match the type but break its shape.
    pub fn validate_for(&self, column: &str, expected: ColumnType) -> Result<(), ColumnValueError> {
        if expected == ColumnType::File {
            return Err(ColumnValueError::FileColumn { column: column.to_string() });
        }
        let found = self.column_type();
        if found != expected {
            return Err(ColumnValueError::TypeMismatch {
                column: column.to_string(),
                expected,
                found,
            });
        }
        match self {
            Self::Rating { stars } if !(1..=5).contains(stars) => {
                Err(ColumnValueError::RatingOutOfRange { value: *stars })
            }
            Self::Link { url, .. } if url.trim().is_empty() => {
                Err(ColumnValueError::EmptyUrl { column: column.to_string() })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "columns_tests.rs"]
mod tests;
