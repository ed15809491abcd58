use std::time::Duration;

use model::{ColumnValue, HandlerError, ItemStatus, RemoteFetchError, RemoteItemRecord};

use super::*;
use crate::detector::NewItem;
use crate::dispatch::ItemHandler;
use crate::mirror::Workspace;
use crate::test_support::{
    group_id, item, item_id, remote_board, wait_until, FakeRemote, RecordingHandler, WriteCall,
};

fn fast() -> InputBoardConfig {
    InputBoardConfig::default()
        .with_poll_interval(PollInterval::from_millis(10).unwrap())
        .with_status_tracking(false)
}

async fn upstream_unavailable(_: NewItem) -> Result<(), HandlerError> {
    Err(HandlerError::new("upstream unavailable"))
}

/// A workspace with one board "Intake" holding groups Inbox and Archive.
async fn workspace(remote: &Arc<FakeRemote>) -> Workspace {
    workspace_with_inbox(remote, &[]).await
}

/// Like [`workspace`], with `(id, name)` items already in Inbox when the
/// workspace is hydrated.
async fn workspace_with_inbox(remote: &Arc<FakeRemote>, inbox: &[(&str, &str)]) -> Workspace {
    let mut board = remote_board(
        "b1",
        "Intake",
        &[("g-inbox", "Inbox"), ("g-archive", "Archive")],
        &[],
    );
    board.items = inbox
        .iter()
        .map(|(id, name)| RemoteItemRecord {
            id: item_id(id),
            name: name.to_string(),
            group_id: group_id("g-inbox"),
            cells: Vec::new(),
        })
        .collect();
    remote.seed_workspace("Ops", vec![board]);
    Workspace::connect("Ops", remote.handle()).await.unwrap()
}

#[tokio::test]
async fn lifecycle_transitions() {
    let remote = FakeRemote::new();
    let mut ws = workspace(&remote).await;
    let board = ws
        .promote_to_input_board("Intake", ExecutionMapping::new(), fast())
        .await
        .unwrap();
    assert_eq!(board.state(), BoardState::Created);

    board.start().unwrap();
    assert_eq!(board.state(), BoardState::Running);
    assert_eq!(
        board.start(),
        Err(LifecycleError::AlreadyRunning { board: "Intake".into() })
    );

    board.stop(StopMode::Drain).await.unwrap();
    assert_eq!(board.state(), BoardState::Stopped);
    assert_eq!(board.start(), Err(LifecycleError::Stopped { board: "Intake".into() }));

    board.stop(StopMode::Drain).await.unwrap();
    assert_eq!(board.state(), BoardState::Stopped);
}

#[tokio::test]
async fn stopping_a_board_that_never_started_is_a_no_op() {
    let remote = FakeRemote::new();
    let mut ws = workspace(&remote).await;
    let board = ws
        .promote_to_input_board("Intake", ExecutionMapping::new(), fast())
        .await
        .unwrap();

    board.stop(StopMode::Graceful).await.unwrap();

    assert_eq!(board.state(), BoardState::Stopped);
    assert_eq!(remote.fetch_count(&group_id("g-inbox")), 0);
}

#[tokio::test]
async fn new_item_in_watched_group_runs_its_handler_once() {
    let remote = FakeRemote::new();
    remote.set_group_items(&group_id("g-inbox"), vec![item("1", "existing")]);
    let mut ws = workspace_with_inbox(&remote, &[("1", "existing")]).await;
    let recorder = RecordingHandler::default();
    let mapping = ExecutionMapping::new().on_group("Inbox", recorder.clone());
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= 1).await;
    remote.set_group_items(&group_id("g-inbox"), vec![item("1", "existing"), item("2", "fresh")]);
    wait_until(|| !recorder.seen().is_empty()).await;
    let fetches = remote.fetch_count(&group_id("g-inbox"));
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= fetches + 3).await;
    board.stop(StopMode::Drain).await.unwrap();

    assert_eq!(recorder.names(), vec!["fresh".to_string()]);
    let seen = recorder.seen();
    assert_eq!(seen[0].group_title, "Inbox");
    assert_eq!(seen[0].group, group_id("g-inbox"));
    assert_eq!(board.stats().succeeded, 1);
}

#[tokio::test]
async fn unmapped_groups_are_never_polled() {
    let remote = FakeRemote::new();
    let mut ws = workspace(&remote).await;
    let mapping = ExecutionMapping::new()
        .on_group("Inbox", RecordingHandler::default())
        .on_group("Nowhere", RecordingHandler::default());
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    let watched: Vec<String> = board.watch_set().into_iter().map(|w| w.title).collect();
    assert_eq!(watched, vec!["Inbox".to_string()]);

    board.start().unwrap();
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= 3).await;
    board.stop(StopMode::Drain).await.unwrap();

    assert_eq!(remote.fetch_count(&group_id("g-archive")), 0);
}

#[tokio::test]
async fn no_cycle_runs_after_stop_returns() {
    let remote = FakeRemote::new();
    let mut ws = workspace(&remote).await;
    let mapping = ExecutionMapping::new().on_group("Inbox", RecordingHandler::default());
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= 2).await;
    board.stop(StopMode::Drain).await.unwrap();
    let after_stop = remote.fetch_count(&group_id("g-inbox"));
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(remote.fetch_count(&group_id("g-inbox")), after_stop);
}

#[tokio::test]
async fn stop_does_not_wait_for_an_in_progress_cycle() {
    let remote = FakeRemote::with_fetch_delay(Duration::from_millis(500));
    let mut ws = workspace(&remote).await;
    let mapping = ExecutionMapping::new()
        .on_group("Inbox", RecordingHandler::default())
        .on_group("Archive", RecordingHandler::default());
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stopping = tokio::time::Instant::now();
    board.stop(StopMode::Abort).await.unwrap();

    assert!(stopping.elapsed() < Duration::from_millis(100));
    assert_eq!(remote.fetch_count(&group_id("g-inbox")), 0);
    assert_eq!(remote.fetch_count(&group_id("g-archive")), 0);
}

#[tokio::test]
async fn item_added_after_hydration_fires_despite_a_failed_first_fetch() {
    let remote = FakeRemote::new();
    remote.script_group(
        &group_id("g-inbox"),
        vec![
            Err(RemoteFetchError::Transport { message: "connection reset".into() }),
            Ok(vec![item("1", "A"), item("2", "B")]),
        ],
    );
    let mut ws = workspace_with_inbox(&remote, &[("1", "A")]).await;
    let recorder = RecordingHandler::default();
    let mapping = ExecutionMapping::new().on_group("Inbox", recorder.clone());
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= 5).await;
    board.stop(StopMode::Drain).await.unwrap();

    assert_eq!(recorder.names(), vec!["B".to_string()]);
}

#[tokio::test]
async fn dispatch_mode_fires_items_present_at_hydration() {
    let remote = FakeRemote::new();
    remote.set_group_items(&group_id("g-inbox"), vec![item("1", "A")]);
    let mut ws = workspace_with_inbox(&remote, &[("1", "A")]).await;
    let recorder = RecordingHandler::default();
    let mapping = ExecutionMapping::new().on_group("Inbox", recorder.clone());
    let config = fast().with_initial_items(InitialItems::Dispatch);
    let board = ws.promote_to_input_board("Intake", mapping, config).await.unwrap();

    board.start().unwrap();
    wait_until(|| remote.fetch_count(&group_id("g-inbox")) >= 3).await;
    board.stop(StopMode::Drain).await.unwrap();

    assert_eq!(recorder.names(), vec!["A".to_string()]);
}

#[tokio::test]
async fn dropping_a_running_board_lets_handlers_finish() {
    let remote = FakeRemote::new();
    remote.script_group(&group_id("g-inbox"), vec![Ok(vec![]), Ok(vec![item("1", "slow")])]);
    let mut ws = workspace(&remote).await;
    let started = RecordingHandler::default();
    let finished = RecordingHandler::default();
    let (on_start, on_finish) = (started.clone(), finished.clone());
    let mapping = ExecutionMapping::new().on_group("Inbox", move |item: NewItem| {
        let (on_start, on_finish) = (on_start.clone(), on_finish.clone());
        async move {
            on_start.handle(item.clone()).await?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            on_finish.handle(item).await
        }
    });
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| !started.seen().is_empty()).await;
    drop(ws);

    wait_until(|| !finished.seen().is_empty()).await;
    assert_eq!(finished.names(), vec!["slow".to_string()]);
}

#[tokio::test]
async fn abort_cancels_running_handlers() {
    let remote = FakeRemote::new();
    remote.script_group(&group_id("g-inbox"), vec![Ok(vec![]), Ok(vec![item("1", "slow")])]);
    let mut ws = workspace(&remote).await;
    let started = RecordingHandler::default();
    let recorder = started.clone();
    let mapping = ExecutionMapping::new().on_group("Inbox", move |item: NewItem| {
        let recorder = recorder.clone();
        async move {
            recorder.handle(item).await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<(), HandlerError>(())
        }
    });
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| !started.seen().is_empty()).await;
    tokio::time::timeout(Duration::from_secs(5), board.stop(StopMode::Abort))
        .await
        .expect("abort must not wait for handlers")
        .unwrap();

    let stats = board.stats();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.finished(), 0);
}

#[tokio::test]
async fn graceful_stop_leaves_handlers_running_until_awaited() {
    let remote = FakeRemote::new();
    remote.script_group(&group_id("g-inbox"), vec![Ok(vec![]), Ok(vec![item("1", "slow")])]);
    let mut ws = workspace(&remote).await;
    let started = RecordingHandler::default();
    let recorder = started.clone();
    let mapping = ExecutionMapping::new().on_group("Inbox", move |item: NewItem| {
        let recorder = recorder.clone();
        async move {
            recorder.handle(item).await?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<(), HandlerError>(())
        }
    });
    let board = ws.promote_to_input_board("Intake", mapping, fast()).await.unwrap();

    board.start().unwrap();
    wait_until(|| !started.seen().is_empty()).await;
    board.stop(StopMode::Graceful).await.unwrap();
    assert_eq!(board.stats().finished(), 0);

    board.wait_for_handlers().await;
    assert_eq!(board.stats().succeeded, 1);
}

#[tokio::test]
async fn status_column_is_created_and_tracks_handler_outcome() {
    let remote = FakeRemote::new();
    remote.script_group(&group_id("g-inbox"), vec![Ok(vec![]), Ok(vec![item("7", "report")])]);
    let mut ws = workspace(&remote).await;
    let mapping = ExecutionMapping::new().on_group("Inbox", upstream_unavailable);
    let config = fast().with_status_tracking(true);
    let board = ws.promote_to_input_board("Intake", mapping, config).await.unwrap();
    let status = board.board().column(STATUS_COLUMN_TITLE).unwrap();
    assert_eq!(status.column_type(), ColumnType::Status);
    let status_id = status.id().clone();

    board.start().unwrap();
    wait_until(|| board.stats().failed == 1).await;
    wait_until(|| {
        remote
            .writes()
            .iter()
            .filter(|w| matches!(w, WriteCall::ChangeColumnValue { .. }))
            .count()
            >= 2
    })
    .await;
    board.stop(StopMode::Drain).await.unwrap();

    let statuses: Vec<ColumnValue> = remote
        .writes()
        .into_iter()
        .filter_map(|w| match w {
            WriteCall::ChangeColumnValue { column, value, .. } if column == status_id => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ColumnValue::status_index(ItemStatus::Working.label_index()),
            ColumnValue::status_index(ItemStatus::Stuck.label_index()),
        ]
    );
}

#[test]
fn zero_concurrency_is_rejected() {
    assert_eq!(
        InputBoardConfig::default().with_max_concurrent_handlers(0),
        Err(ConfigurationError::ZeroConcurrency)
    );
    let config = InputBoardConfig::default().with_max_concurrent_handlers(4).unwrap();
    assert_eq!(config.max_concurrent_handlers, NonZeroUsize::new(4));
}
