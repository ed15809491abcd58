use super::*;

#[test]
fn success_returns_the_data_object() {
    let data = classify_response(200, r#"{"data":{"boards":[]},"account_id":1}"#).unwrap();
    assert_eq!(data, serde_json::json!({ "boards": [] }));
}

#[test]
fn rejected_token_is_unauthorized() {
    assert_eq!(
        classify_response(401, "Not Authenticated"),
        Err(MondayError::Unauthorized { status: 401 })
    );
    assert_eq!(
        classify_response(403, "{}"),
        Err(MondayError::Unauthorized { status: 403 })
    );
}

#[test]
fn complexity_budget_message_is_rate_limited_with_reset_plus_one() {
    let body = r#"{"errors":[{"message":"Complexity budget exhausted, query cost 30001 budget remaining 0 out of 1000000 reset in 12 seconds"}]}"#;
    assert_eq!(
        classify_response(200, body),
        Err(MondayError::RateLimited { retry_after: Duration::from_secs(13) })
    );
}

#[test]
fn zero_second_reset_still_waits_one_second() {
    assert_eq!(retry_delay("Complexity budget exhausted, reset in 0 seconds"), Duration::from_secs(1));
}

#[test]
fn rate_limit_without_delay_waits_five_seconds() {
    assert_eq!(retry_delay("Complexity budget exhausted"), DEFAULT_RATE_LIMIT_DELAY);
    assert_eq!(retry_delay("reset in soon"), DEFAULT_RATE_LIMIT_DELAY);
    assert_eq!(
        classify_response(429, "Too Many Requests"),
        Err(MondayError::RateLimited { retry_after: Duration::from_secs(5) })
    );
}

#[test]
fn legacy_error_message_shape_is_recognised() {
    let body = r#"{"error_message":"Complexity budget exhausted, reset in 3 seconds","status_code":429}"#;
    assert_eq!(
        classify_response(200, body),
        Err(MondayError::RateLimited { retry_after: Duration::from_secs(4) })
    );
}

#[test]
fn other_graphql_errors_are_joined() {
    let body = r#"{"errors":[{"message":"Field 'x' doesn't exist"},{"message":"Parse error"}],"data":null}"#;
    assert_eq!(
        classify_response(200, body),
        Err(MondayError::GraphQl("Field 'x' doesn't exist; Parse error".into()))
    );
}

#[test]
fn non_json_server_error_keeps_an_excerpt() {
    let body = "x".repeat(1000);
    let Err(MondayError::Status { status, body }) = classify_response(502, &body) else {
        panic!("expected a status error");
    };
    assert_eq!(status, 502);
    assert_eq!(body.len(), BODY_EXCERPT_LEN + 3);
}

#[test]
fn malformed_success_body_is_a_decode_error() {
    assert!(matches!(classify_response(200, "not json"), Err(MondayError::Decode(_))));
    assert!(matches!(classify_response(200, "{}"), Err(MondayError::Decode(_))));
}

#[test]
fn errors_map_onto_port_errors() {
    let fetch: RemoteFetchError = MondayError::RateLimited { retry_after: Duration::from_secs(2) }.into();
    assert_eq!(fetch, RemoteFetchError::RateLimited { retry_after: Some(Duration::from_secs(2)) });

    let fetch: RemoteFetchError = MondayError::Status { status: 503, body: "down".into() }.into();
    assert!(matches!(fetch, RemoteFetchError::Transport { .. }));

    let write: RemoteWriteError = MondayError::Decode("bad".into()).into();
    assert_eq!(write, RemoteWriteError::Malformed { message: "bad".into() });

    let write: RemoteWriteError =
        MondayError::File { path: "a.txt".into(), message: "gone".into() }.into();
    assert!(matches!(write, RemoteWriteError::File { .. }));
}
