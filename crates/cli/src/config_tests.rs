use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use super::*;

const REQUIRED: [(&str, &str); 4] = [
    ("MONDAY_API_TOKEN", "tok"),
    ("MONDAY_WORKSPACE", "Ops"),
    ("WATCH_BOARD", "Intake"),
    ("WATCH_GROUPS", "Inbox, Urgent ,"),
];

fn parse(extra: &[(&str, &str)]) -> Result<WatchConfig, ConfigurationError> {
    let vars: HashMap<String, String> = REQUIRED
        .iter()
        .chain(extra)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    WatchConfig::from_lookup(move |key: &str| vars.get(key).cloned())
}

#[test]
fn required_values_with_defaults() {
    let cfg = parse(&[]).unwrap();

    assert_eq!(cfg.token.expose(), "tok");
    assert_eq!(cfg.workspace, "Ops");
    assert_eq!(cfg.board, "Intake");
    assert_eq!(cfg.groups, ["Inbox", "Urgent"]);
    assert_eq!(cfg.forward_group, None);
    assert_eq!(cfg.input_board, InputBoardConfig::default());
}

#[test]
fn optional_values_are_applied() {
    let cfg = parse(&[
        ("WATCH_POLL_INTERVAL_MS", "250"),
        ("WATCH_MAX_CONCURRENT_HANDLERS", "4"),
        ("WATCH_INITIAL_ITEMS", "Dispatch"),
        ("WATCH_FORWARD_GROUP", "Done"),
    ])
    .unwrap();

    assert_eq!(cfg.input_board.poll_interval.as_duration(), Duration::from_millis(250));
    assert_eq!(cfg.input_board.max_concurrent_handlers, NonZeroUsize::new(4));
    assert_eq!(cfg.input_board.initial_items, InitialItems::Dispatch);
    assert_eq!(cfg.forward_group.as_deref(), Some("Done"));
}

#[test]
fn missing_required_value_is_named() {
    let vars: HashMap<&str, &str> = REQUIRED.into_iter().filter(|(k, _)| *k != "WATCH_BOARD").collect();
    let err = WatchConfig::from_lookup(|key: &str| vars.get(key).map(|v| v.to_string())).unwrap_err();

    assert_eq!(err, ConfigurationError::MissingSetting { name: "WATCH_BOARD".into() });
}

#[test]
fn blank_token_counts_as_missing() {
    let err = parse(&[("MONDAY_API_TOKEN", "   ")]).unwrap_err();
    assert_eq!(err, ConfigurationError::MissingSetting { name: "MONDAY_API_TOKEN".into() });
}

#[test]
fn zero_interval_and_zero_concurrency_are_rejected() {
    assert_eq!(parse(&[("WATCH_POLL_INTERVAL_MS", "0")]).unwrap_err(), ConfigurationError::ZeroPollInterval);
    assert_eq!(
        parse(&[("WATCH_MAX_CONCURRENT_HANDLERS", "0")]).unwrap_err(),
        ConfigurationError::ZeroConcurrency
    );
}

#[test]
fn malformed_values_are_invalid_settings() {
    for (key, raw) in [
        ("WATCH_POLL_INTERVAL_MS", "soon"),
        ("WATCH_INITIAL_ITEMS", "all"),
        ("WATCH_GROUPS", " , "),
    ] {
        let err = parse(&[(key, raw)]).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::InvalidSetting { ref name, .. } if name == key),
            "{key}={raw}: {err:?}"
        );
    }
}

#[test]
fn forwarding_into_a_watched_group_is_rejected() {
    let err = parse(&[("WATCH_FORWARD_GROUP", "Urgent")]).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidSetting { ref name, .. } if name == "WATCH_FORWARD_GROUP"));
}
