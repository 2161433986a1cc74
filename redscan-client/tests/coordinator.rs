//! End-to-end coordinator behaviour against scripted service outcomes.
//!
//! Every test drives the real actor through its public handle; only the
//! HTTP executor and the channel connector are stubbed. Paused time makes
//! the grace-window assertions instant.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use redscan_client::channel::ChannelSignal;
use redscan_client::coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorHandle,
};
use redscan_client::error::{ScanError, SessionFailure};
use redscan_client::render::{ScanView, render, report_reference};
use redscan_model::ids::{ChannelToken, ScanId};
use redscan_model::session::SessionStatus;
use redscan_model::stage::{Stage, StageState};

#[path = "support/mod.rs"]
mod support;

use support::{
    StubScanApi, TestConnector, finding, progress, settle, verdict, wait_for,
};

fn spawn_coordinator() -> (CoordinatorHandle, StubScanApi, TestConnector) {
    let api = StubScanApi::new();
    let connector = TestConnector::new();
    let handle = Coordinator::spawn(
        Arc::new(api.clone()),
        Arc::new(connector.clone()),
        CoordinatorConfig::default(),
    );
    (handle, api, connector)
}

#[tokio::test(start_paused = true)]
async fn scan_runs_to_success_with_streamed_progress() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let id = ScanId::new();
    api.gate().await;
    api.script_success(
        "llm_001",
        verdict(
            id,
            vec![finding(
                r#"{"attack": "Prompt Injection", "status": "VULNERABLE", "confidence": 0.8}"#,
            )],
        ),
    )
    .await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let starting =
        wait_for(&mut updates, |s| s.status == SessionStatus::Starting).await;
    let token = starting.channel_token.expect("channel token after start");
    assert!(token.is_provisional());
    assert_eq!(
        starting.timeline.state_of(Stage::Profiling),
        StageState::Running
    );

    connector.emit(
        token,
        progress(
            r#"{"agent": "Target Profiling", "progress": -1, "details": "Profiling target"}"#,
        ),
    );
    let running =
        wait_for(&mut updates, |s| s.status == SessionStatus::Running).await;
    assert_eq!(running.detail.as_deref(), Some("Profiling target"));

    connector.emit(token, progress(r#"{"agent": "Profiling", "progress": -2}"#));
    connector.emit(token, progress(r#"{"agent": "Strategy", "progress": 40}"#));
    let midway = wait_for(&mut updates, |s| s.percent == Some(40)).await;
    assert_eq!(midway.timeline.state_of(Stage::Profiling), StageState::Done);
    assert_eq!(
        midway.timeline.state_of(Stage::Strategy),
        StageState::Running
    );

    api.release_one();
    let done =
        wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    assert_eq!(done.scan_id, Some(id));
    assert!(done.timeline.all_done());
    assert_eq!(done.percent, Some(100));
    assert_eq!(done.results.len(), 1);

    // The channel was re-keyed from the provisional token to the scan id.
    let tokens = connector.connected_tokens();
    assert_eq!(tokens.len(), 2);
    assert!(tokens[0].is_provisional());
    assert_eq!(tokens[1], ChannelToken::from(id));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn superseding_start_discards_the_earlier_attempt() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let first_id = ScanId::new();
    let second_id = ScanId::new();
    api.gate().await;
    api.script_success(
        "llm_a",
        verdict(
            first_id,
            vec![finding(r#"{"attack": "Data Leakage", "status": "VULNERABLE"}"#)],
        ),
    )
    .await;
    api.script_success("llm_b", verdict(second_id, Vec::new())).await;

    handle.start("llm_a")?;
    let mut updates = handle.subscribe();
    let first = wait_for(&mut updates, |s| s.generation == 1).await;
    let first_token = first.channel_token.expect("first channel token");

    handle.start("llm_b")?;
    let second = wait_for(&mut updates, |s| s.generation == 2).await;
    assert_eq!(second.target.as_deref(), Some("llm_b"));
    assert_eq!(second.status, SessionStatus::Starting);

    // The superseded attempt's reader went down with it.
    settle().await;
    assert_eq!(connector.torn_down_tokens(), vec![first_token]);

    // Progress addressed to the first attempt no longer lands.
    connector.emit(
        first_token,
        progress(r#"{"agent": "Execution", "progress": 90}"#),
    );
    settle().await;
    assert_eq!(handle.current().percent, None);

    // Both verdicts resolve; only the second one applies.
    api.release_one();
    api.release_one();
    wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    settle().await;

    let done = handle.current();
    assert_eq!(done.generation, 2);
    assert_eq!(done.scan_id, Some(second_id));
    assert!(done.results.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancel_tears_down_the_channel_and_is_idempotent() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    api.gate().await;
    api.script_success("llm_001", verdict(ScanId::new(), Vec::new()))
        .await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let starting =
        wait_for(&mut updates, |s| s.status == SessionStatus::Starting).await;
    let token = starting.channel_token.expect("channel token after start");

    handle.cancel()?;
    let cancelled =
        wait_for(&mut updates, |s| s.status == SessionStatus::Cancelled).await;
    assert_eq!(cancelled.generation, 1);
    settle().await;
    assert_eq!(connector.torn_down_tokens(), vec![token]);

    // A second cancel changes nothing.
    handle.cancel()?;
    settle().await;
    assert_eq!(handle.current().status, SessionStatus::Cancelled);
    assert_eq!(connector.torn_down_tokens(), vec![token]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn late_verdict_after_cancel_is_discarded() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let id = ScanId::new();
    api.gate().await;
    api.script_success(
        "llm_001",
        verdict(
            id,
            vec![finding(r#"{"attack": "Prompt Injection", "status": "VULNERABLE"}"#)],
        ),
    )
    .await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    wait_for(&mut updates, |s| s.status == SessionStatus::Starting).await;
    handle.cancel()?;
    wait_for(&mut updates, |s| s.status == SessionStatus::Cancelled).await;

    // The request resolves successfully after the cancel took effect.
    api.release_one();
    settle().await;

    let state = handle.current();
    assert_eq!(state.status, SessionStatus::Cancelled);
    assert!(state.results.is_empty());
    assert_eq!(state.scan_id, None);
    assert_eq!(report_reference(&state), None);
    // No re-keyed connection was opened for the discarded verdict.
    assert_eq!(connector.connected_tokens().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_request_surfaces_the_service_detail() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    api.script_failure(
        "llm_001",
        ScanError::RequestFailed {
            detail: "upstream timeout".to_string(),
        },
    )
    .await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let failed =
        wait_for(&mut updates, |s| s.status == SessionStatus::Failed).await;

    assert_eq!(
        failed.failure,
        Some(SessionFailure::request("upstream timeout"))
    );
    assert_eq!(failed.timeline.active_stage(), None);
    assert_eq!(
        failed.timeline.state_of(Stage::Profiling),
        StageState::Error
    );

    match render(&failed) {
        ScanView::Failed { detail, .. } => assert_eq!(detail, "upstream timeout"),
        other => panic!("expected failed view, got {other:?}"),
    }

    settle().await;
    assert_eq!(connector.torn_down_tokens().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_fail_before_any_scan() -> Result<()> {
    let (handle, api, _connector) = spawn_coordinator();
    api.script_failure("llm_001", ScanError::AuthRequired).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let failed =
        wait_for(&mut updates, |s| s.status == SessionStatus::Failed).await;
    assert_eq!(failed.failure, Some(SessionFailure::AuthRequired));
    assert_eq!(render(&failed), ScanView::LoginRequired);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn percent_regression_keeps_the_last_write() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    api.gate().await;
    api.script_success("llm_001", verdict(ScanId::new(), Vec::new()))
        .await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let starting =
        wait_for(&mut updates, |s| s.status == SessionStatus::Starting).await;
    let token = starting.channel_token.expect("channel token after start");

    connector.emit(token, progress(r#"{"agent": "Execution", "progress": 55}"#));
    wait_for(&mut updates, |s| s.percent == Some(55)).await;

    // A later agent restarts its own count; the regression sticks.
    connector.emit(token, progress(r#"{"agent": "Observer", "progress": 10}"#));
    let regressed = wait_for(&mut updates, |s| s.percent == Some(10)).await;
    assert_eq!(
        regressed.timeline.state_of(Stage::Analysis),
        StageState::Running
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_results_still_succeed_with_a_report() -> Result<()> {
    let (handle, api, _connector) = spawn_coordinator();
    let id = ScanId::new();
    api.script_success("llm_001", verdict(id, Vec::new())).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let done =
        wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;

    assert!(done.results.is_empty());
    assert_eq!(report_reference(&done).map(|r| r.scan_id), Some(id));
    assert!(matches!(render(&done), ScanView::Empty { report: Some(_) }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn channel_closes_after_the_grace_window() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let id = ScanId::new();
    api.script_success("llm_001", verdict(id, Vec::new())).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    settle().await;

    // Within the grace window the re-keyed reader stays live.
    let assigned = ChannelToken::from(id);
    assert_eq!(connector.connected_tokens().last(), Some(&assigned));
    assert!(!connector.torn_down_tokens().contains(&assigned));

    // Past the window it is gone.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(connector.torn_down_tokens().contains(&assigned));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn progress_after_success_does_not_reopen_the_session() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let id = ScanId::new();
    api.script_success("llm_001", verdict(id, Vec::new())).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let done =
        wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    assert!(done.timeline.all_done());

    // A trailing frame arrives on the re-keyed channel inside the grace
    // window; the resolved session does not move.
    connector.emit(
        ChannelToken::from(id),
        progress(r#"{"agent": "Observer", "progress": 10}"#),
    );
    settle().await;
    let after = handle.current();
    assert_eq!(after.status, SessionStatus::Succeeded);
    assert_eq!(after.percent, Some(100));
    assert!(after.timeline.all_done());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn channel_trouble_degrades_without_failing_the_scan() -> Result<()> {
    let (handle, api, connector) = spawn_coordinator();
    let id = ScanId::new();
    api.gate().await;
    api.script_success("llm_001", verdict(id, Vec::new())).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    let starting =
        wait_for(&mut updates, |s| s.status == SessionStatus::Starting).await;
    let token = starting.channel_token.expect("channel token after start");

    // The reader reports trouble and closes; the session keeps going.
    connector.emit_signal(
        token,
        ChannelSignal::Error("connection reset".to_string()),
    );
    connector.emit_signal(token, ChannelSignal::Closed);
    settle().await;
    assert!(handle.current().status.is_active());

    api.release_one();
    let done =
        wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    assert_eq!(done.scan_id, Some(id));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_after_failure_begins_clean() -> Result<()> {
    let (handle, api, _connector) = spawn_coordinator();
    api.script_failure(
        "llm_001",
        ScanError::RequestFailed {
            detail: "Target not found".to_string(),
        },
    )
    .await;
    let id = ScanId::new();
    api.script_success("llm_001", verdict(id, Vec::new())).await;

    handle.start("llm_001")?;
    let mut updates = handle.subscribe();
    wait_for(&mut updates, |s| s.status == SessionStatus::Failed).await;

    handle.start("llm_001")?;
    let done =
        wait_for(&mut updates, |s| s.status == SessionStatus::Succeeded).await;
    assert_eq!(done.generation, 2);
    assert!(done.failure.is_none());
    assert_eq!(done.scan_id, Some(id));
    Ok(())
}
