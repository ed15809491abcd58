//! Adapter errors and response classification.
//!
//! DESIGN
//! ======
//! Every HTTP exchange ends in [`classify_response`], a pure function from
//! `(status, body)` to either the response's `data` object or a
//! [`MondayError`]. The client only decides whether to retry; the mapping onto
//! the core's [`RemoteFetchError`] / [`RemoteWriteError`] happens in the `From`
//! impls below.

use std::path::PathBuf;
use std::time::Duration;

use model::{RemoteFetchError, RemoteWriteError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Back-off when a rate-limit message carries no usable delay.
pub(crate) const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

const COMPLEXITY_EXHAUSTED: &str = "Complexity budget exhausted";
const RESET_MARKER: &str = "reset in ";

/// Longest slice of a raw body kept in an error message.
const BODY_EXCERPT_LEN: usize = 256;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MondayError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API token rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("rate limited; retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("cannot read '{}': {message}", path.display())]
    File { path: PathBuf, message: String },
}

impl From<reqwest::Error> for MondayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<MondayError> for RemoteFetchError {
    fn from(err: MondayError) -> Self {
        match err {
            MondayError::Unauthorized { .. } => Self::Unauthorized,
            MondayError::RateLimited { retry_after } => Self::RateLimited { retry_after: Some(retry_after) },
            MondayError::GraphQl(message) => Self::Api { message },
            MondayError::Status { status, body } if status >= 500 => {
                Self::Transport { message: format!("HTTP {status}: {body}") }
            }
            MondayError::Status { status, body } => Self::Api { message: format!("HTTP {status}: {body}") },
            MondayError::Decode(message) => Self::Malformed { message },
            MondayError::NotFound { what } => Self::NotFound { what },
            MondayError::ClientBuild(message) | MondayError::Transport(message) => {
                Self::Transport { message }
            }
            e @ MondayError::File { .. } => Self::Transport { message: e.to_string() },
        }
    }
}

impl From<MondayError> for RemoteWriteError {
    fn from(err: MondayError) -> Self {
        match err {
            MondayError::Unauthorized { .. } => Self::Unauthorized,
            MondayError::RateLimited { retry_after } => Self::RateLimited { retry_after: Some(retry_after) },
            MondayError::GraphQl(message) => Self::Api { message },
            MondayError::Status { status, body } if status >= 500 => {
                Self::Transport { message: format!("HTTP {status}: {body}") }
            }
            MondayError::Status { status, body } => Self::Api { message: format!("HTTP {status}: {body}") },
            MondayError::Decode(message) => Self::Malformed { message },
            e @ MondayError::NotFound { .. } => Self::Api { message: e.to_string() },
            MondayError::ClientBuild(message) | MondayError::Transport(message) => {
                Self::Transport { message }
            }
            MondayError::File { path, message } => Self::File { path, message },
        }
    }
}

// ----------------------------------------------------------------------------
// Response classification
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope {
    data: Option<Value>,
    errors: Option<Vec<GraphQlError>>,
    /// Older error shape: `{"error_message": "...", "status_code": 500}`.
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

/// Turns one HTTP exchange into the response's `data` object or an error.
pub(crate) fn classify_response(status: u16, body: &str) -> Result<Value, MondayError> {
    if status == 401 || status == 403 {
        return Err(MondayError::Unauthorized { status });
    }
    if status == 429 {
        return Err(MondayError::RateLimited { retry_after: retry_delay(body) });
    }

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(MondayError::Status { status, body: excerpt(body) });
        }
        Err(e) => return Err(MondayError::Decode(e.to_string())),
    };

    let mut messages: Vec<String> = envelope
        .errors
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.message)
        .collect();
    messages.extend(envelope.error_message);
    if let Some(limited) = messages.iter().find(|m| m.contains(COMPLEXITY_EXHAUSTED)) {
        return Err(MondayError::RateLimited { retry_after: retry_delay(limited) });
    }
    if !messages.is_empty() {
        return Err(MondayError::GraphQl(messages.join("; ")));
    }
    if !(200..300).contains(&status) {
        return Err(MondayError::Status { status, body: excerpt(body) });
    }

    envelope
        .data
        .ok_or_else(|| MondayError::Decode("response has neither data nor errors".into()))
}

/// Reads the delay out of "... reset in N seconds"; one extra second is added
/// because the API sometimes reports zero.
pub(crate) fn retry_delay(message: &str) -> Duration {
    message
        .split_once(RESET_MARKER)
        .and_then(|(_, rest)| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .map_or(DEFAULT_RATE_LIMIT_DELAY, |secs| Duration::from_secs(secs + 1))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
