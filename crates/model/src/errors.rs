//! Error taxonomy and retry-policy types shared by every crate.
//!
//! | Error | Raised by | Propagation |
//! |-------|-----------|-------------|
//! | [`RemoteFetchError`] | [`crate::SnapshotProvider`] | Local to one group and one poll cycle; retried next cycle |
//! | [`RemoteWriteError`] | [`crate::MutationProvider`] | Surfaced to the caller of the mutation; never retried by the core |
//! | [`HandlerError`] | caller-supplied handlers | Caught and reported at the dispatch boundary |
//! | [`ConfigurationError`] | construction / config loading | Fatal before anything starts |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ColumnType;

// ----------------------------------------------------------------------------
// Retry semantics
// ----------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: transport failures, rate-limit / complexity-budget
///   responses, server-side 5xx.
/// - `NonRetryable` errors: rejected credentials, malformed responses, API
///   validation errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without outside intervention.
    NonRetryable,
}

// ----------------------------------------------------------------------------
// Remote reads
// ----------------------------------------------------------------------------

/// A read against the remote service failed.
///
/// Transient by classification: the change detector leaves the affected
/// group's snapshot untouched and tries again on the next tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteFetchError {
    /// The request never produced a usable HTTP response.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The access token was rejected.
    #[error("access token rejected by the remote service")]
    Unauthorized,

    /// The remote asked us to slow down.
    #[error("rate limited by the remote service")]
    RateLimited {
        /// Delay advertised by the remote, if any.
        retry_after: Option<Duration>,
    },

    /// The remote answered with an application-level error.
    #[error("remote API error: {message}")]
    Api { message: String },

    /// The response did not have the expected shape.
    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// The requested board or group does not exist remotely.
    #[error("{what} not found")]
    NotFound { what: String },
}

impl RemoteFetchError {
    /// Returns whether the failed read can be repeated as-is.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } | Self::Api { .. } => RetryPolicy::Retryable { after: None },
            Self::RateLimited { retry_after } => RetryPolicy::Retryable { after: *retry_after },
            Self::Unauthorized | Self::Malformed { .. } | Self::NotFound { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Remote writes
// ----------------------------------------------------------------------------

/// A mutation against the remote service failed.
///
/// Returned to whoever issued the mutation. The mirror is left exactly as it
/// was before the call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteWriteError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("access token rejected by the remote service")]
    Unauthorized,

    #[error("rate limited by the remote service")]
    RateLimited { retry_after: Option<Duration> },

    #[error("remote API error: {message}")]
    Api { message: String },

    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// A local file that was to be uploaded could not be read.
    #[error("cannot read '{}': {message}", path.display())]
    File { path: PathBuf, message: String },
}

impl RemoteWriteError {
    /// Returns whether the failed write can be repeated as-is.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            Self::RateLimited { retry_after } => RetryPolicy::Retryable { after: *retry_after },
            Self::Unauthorized | Self::Api { .. } | Self::Malformed { .. } | Self::File { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

/// A caller-supplied handler reported failure.
///
/// The dispatch engine logs it with the offending group and item and moves
/// on; it never reaches the change detector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error from a human-readable description.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Returns the failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RemoteWriteError> for HandlerError {
    fn from(err: RemoteWriteError) -> Self {
        Self::new(err.to_string())
    }
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Invalid configuration. Always fatal, always raised before `start()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A polling interval of zero would spin the detector.
    #[error("polling interval must be greater than zero")]
    ZeroPollInterval,

    /// A concurrency bound of zero would never run any handler.
    #[error("handler concurrency bound must be greater than zero")]
    ZeroConcurrency,

    /// A required setting was not supplied.
    #[error("missing required setting {name}")]
    MissingSetting { name: String },

    /// A setting was supplied but could not be parsed.
    #[error("invalid value for {name}: {message}")]
    InvalidSetting { name: String, message: String },
}

// ----------------------------------------------------------------------------
// Column values
// ----------------------------------------------------------------------------

/// A column value does not fit the column it is written to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColumnValueError {
    /// The value's variant belongs to a different column type.
    #[error("column '{column}' is of type {expected}, got a {found} value")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// File columns only accept uploads.
    #[error("column '{column}' is a file column; attach files by upload")]
    FileColumn { column: String },

    /// Ratings are whole stars between 1 and 5.
    #[error("rating {value} is outside 1..=5")]
    RatingOutOfRange { value: u8 },

    /// Link values need a URL.
    #[error("link value for column '{column}' has an empty URL")]
    EmptyUrl { column: String },
}
