//! Process configuration read from environment variables.

use model::{AccessToken, ConfigurationError, PollInterval};
use workspace::{InitialItems, InputBoardConfig};

/// Everything `board-watch` needs to start watching one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub token: AccessToken,
    pub workspace: String,
    pub board: String,
    /// Group titles to watch, in the order given.
    pub groups: Vec<String>,
    /// Group that receives a copy of every new item, if any.
    pub forward_group: Option<String>,
    pub input_board: InputBoardConfig,
}

impl WatchConfig {
    /// Build typed process config from environment variables.
    ///
    /// Required:
    /// - `MONDAY_API_TOKEN`
    /// - `MONDAY_WORKSPACE`
    /// - `WATCH_BOARD`
    /// - `WATCH_GROUPS`: comma-separated group titles
    ///
    /// Optional:
    /// - `WATCH_POLL_INTERVAL_MS`: default 1000, must be > 0
    /// - `WATCH_MAX_CONCURRENT_HANDLERS`: unbounded when unset, must be > 0
    /// - `WATCH_INITIAL_ITEMS`: `baseline` (default) or `dispatch`
    /// - `WATCH_FORWARD_GROUP`: must not be one of the watched groups
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for a missing required value or a value
    /// that does not parse.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`WatchConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`WatchConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| ConfigurationError::MissingSetting { name: key.to_string() })
        };

        let token = AccessToken::new(required("MONDAY_API_TOKEN")?).ok_or_else(|| {
            ConfigurationError::MissingSetting { name: "MONDAY_API_TOKEN".into() }
        })?;

        let groups: Vec<String> = required("WATCH_GROUPS")?
            .split(',')
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .collect();
        if groups.is_empty() {
            return Err(invalid("WATCH_GROUPS", "no group titles given"));
        }

        let forward_group = get("WATCH_FORWARD_GROUP");
        if let Some(target) = &forward_group {
            if groups.contains(target) {
                return Err(invalid("WATCH_FORWARD_GROUP", format!("'{target}' is also watched")));
            }
        }

        let mut input_board = InputBoardConfig::default();
        if let Some(raw) = get("WATCH_POLL_INTERVAL_MS") {
            let millis = raw
                .parse::<u64>()
                .map_err(|e| invalid("WATCH_POLL_INTERVAL_MS", format!("'{raw}': {e}")))?;
            input_board = input_board.with_poll_interval(PollInterval::from_millis(millis)?);
        }
        if let Some(raw) = get("WATCH_MAX_CONCURRENT_HANDLERS") {
            let limit = raw
                .parse::<usize>()
                .map_err(|e| invalid("WATCH_MAX_CONCURRENT_HANDLERS", format!("'{raw}': {e}")))?;
            input_board = input_board.with_max_concurrent_handlers(limit)?;
        }
        if let Some(raw) = get("WATCH_INITIAL_ITEMS") {
            let initial = match raw.to_ascii_lowercase().as_str() {
                "baseline" => InitialItems::Baseline,
                "dispatch" => InitialItems::Dispatch,
                _ => {
                    return Err(invalid(
                        "WATCH_INITIAL_ITEMS",
                        format!("'{raw}': expected 'baseline' or 'dispatch'"),
                    ))
                }
            };
            input_board = input_board.with_initial_items(initial);
        }

        Ok(Self {
            token,
            workspace: required("MONDAY_WORKSPACE")?,
            board: required("WATCH_BOARD")?,
            groups,
            forward_group,
            input_board,
        })
    }
}

fn invalid(name: &str, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSetting { name: name.to_string(), message: message.into() }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
