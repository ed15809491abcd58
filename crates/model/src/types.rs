//! Shared value types.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! invariants (a polling interval is never zero, a token never shows up in a
//! log line) and participate in domain computations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

// ----------------------------------------------------------------------------
// Credentials
// ----------------------------------------------------------------------------

/// Personal or app access token for the remote service.
///
/// `Debug` and `Display` are redacted so tokens never reach log output via a
/// stray `?token` field.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token, returning `None` if it is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

// ----------------------------------------------------------------------------
// Polling
// ----------------------------------------------------------------------------

/// Interval between two change-detection cycles. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollInterval(Duration);

impl PollInterval {
    /// One second, matching the cadence of the original input boards.
    pub const DEFAULT: Self = Self(Duration::from_secs(1));

    /// Creates a polling interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroPollInterval`] if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, ConfigurationError> {
        if interval.is_zero() {
            Err(ConfigurationError::ZeroPollInterval)
        } else {
            Ok(Self(interval))
        }
    }

    /// Convenience constructor from milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroPollInterval`] if `millis` is zero.
    pub fn from_millis(millis: u64) -> Result<Self, ConfigurationError> {
        Self::new(Duration::from_millis(millis))
    }

    /// Returns the interval as a [`Duration`].
    pub fn as_duration(self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for PollInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0.as_millis())
    }
}

// ----------------------------------------------------------------------------
// Execution status
// ----------------------------------------------------------------------------

/// Progress of a dispatched item, written to an input board's status column.
///
/// Discriminants are the label indices of a freshly created status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// A handler has been scheduled for the item.
    Working,
    /// The handler returned successfully.
    Done,
    /// The handler failed or panicked.
    Stuck,
}

impl ItemStatus {
    /// Label index on a default status column.
    pub fn label_index(self) -> u32 {
        match self {
            Self::Working => 0,
            Self::Done => 1,
            Self::Stuck => 2,
        }
    }
}

// ----------------------------------------------------------------------------
// Time
// ----------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
