//! Adapter configuration parsed from environment variables.

use std::time::Duration;

use model::ConfigurationError;

pub const DEFAULT_API_URL: &str = "https://api.monday.com/v2";
pub const DEFAULT_FILE_API_URL: &str = "https://api.monday.com/v2/file";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BOARDS_LIMIT: u32 = 500;
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// The API refuses `items_page` limits above this.
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MondayConfig {
    pub api_url: String,
    pub file_api_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts after a rate-limited response. Zero disables retrying.
    pub max_retries: u32,
    /// How many boards one listing request asks for.
    pub boards_limit: u32,
    /// Items per `items_page` / `next_items_page` request.
    pub page_size: u32,
}

impl Default for MondayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            file_api_url: DEFAULT_FILE_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            boards_limit: DEFAULT_BOARDS_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MondayConfig {
    /// Build typed adapter config from environment variables.
    ///
    /// All optional:
    /// - `MONDAY_API_URL`: default `https://api.monday.com/v2`
    /// - `MONDAY_FILE_API_URL`: default `https://api.monday.com/v2/file`
    /// - `MONDAY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `MONDAY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `MONDAY_MAX_RETRIES`: default 3
    /// - `MONDAY_BOARDS_LIMIT`: default 500
    /// - `MONDAY_PAGE_SIZE`: default 500, at most 500
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSetting`] for a value that is set
    /// but does not parse or is out of range.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MondayConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`MondayConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let url = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };

        let page_size = parse_or(&lookup, "MONDAY_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigurationError::InvalidSetting {
                name: "MONDAY_PAGE_SIZE".into(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"),
            });
        }
        let boards_limit = parse_or(&lookup, "MONDAY_BOARDS_LIMIT", DEFAULT_BOARDS_LIMIT)?;
        if boards_limit == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: "MONDAY_BOARDS_LIMIT".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            api_url: url("MONDAY_API_URL", DEFAULT_API_URL),
            file_api_url: url("MONDAY_FILE_API_URL", DEFAULT_FILE_API_URL),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MONDAY_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MONDAY_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
            max_retries: parse_or(&lookup, "MONDAY_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            boards_limit,
            page_size,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigurationError::InvalidSetting {
            name: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
