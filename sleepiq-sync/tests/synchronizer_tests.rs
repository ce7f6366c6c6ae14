//! Behavioural tests for FoundationSynchronizer against a scripted API.
//!
//! All tests run on paused Tokio time, so debounce windows and poll
//! intervals elapse instantly and deterministically.


use mock_api::{moving, status, stopped, RecordingObserver, Reply, ScriptedApi};
use sleepiq_client::{Preset, Side};
use sleepiq_sync::{
    Capability, FoundationSynchronizer, MovementOutcome, PollOutcome, StateSource, SyncConfig,
    SyncError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn synchronizer(
    api: &Arc<ScriptedApi>,
    config: SyncConfig,
) -> (FoundationSynchronizer<ScriptedApi>, Arc<RecordingObserver>) {
    let observer = RecordingObserver::new();
    let sync = FoundationSynchronizer::new(Arc::clone(api), config, observer.clone())
        .expect("valid config");
    (sync, observer)
}

#[tokio::test(start_paused = true)]
async fn test_poll_reports_raised_when_head_is_up() {
    let api = ScriptedApi::new(vec![Reply::Status(status(10, 0, false))]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(sync.poll_once().await, PollOutcome::Updated { raised: true });
    assert!(sync.current_state());

    let state = sync.state();
    assert_eq!(state.head_position, 10);
    assert_eq!(state.capability, Capability::Present);
    assert_eq!(state.source, StateSource::Polled);
    assert_eq!(observer.seen(), vec![true]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_every_successful_poll_notifies_observer() {
    let api = ScriptedApi::new(vec![
        Reply::Status(status(0, 0, false)),
        Reply::Status(status(0, 0, false)),
    ]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    sync.poll_once().await;
    sync.poll_once().await;
    assert_eq!(observer.seen(), vec![false, false]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_requests_issue_one_raise() {
    let api = ScriptedApi::new(vec![]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    sync.request_state(true);
    sync.request_state(true);
    sleep(Duration::from_secs(6)).await;

    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);
    assert_eq!(api.sent()[0].side, Side::Left);
    assert_eq!(observer.seen(), vec![true]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_raise_then_flatten_when_already_raised_sends_single_flat() {
    let api = ScriptedApi::new(vec![Reply::Status(status(10, 0, false))]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());
    sync.poll_once().await;

    sync.request_state(true);
    sync.request_state(false);
    assert!(!sync.current_state());

    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent_presets(), vec![Preset::FLAT]);
    assert_eq!(observer.seen(), vec![true, false]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_leading_request_is_sent_without_waiting() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());
    let start = Instant::now();

    sync.request_state(true);
    sleep(Duration::from_millis(100)).await;

    let sent = api.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].preset, Preset::RAISED);
    assert!(sent[0].at - start < Duration::from_millis(100));

    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent().len(), 1);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_toggle_burst_sends_leading_and_trailing_only() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    for target in [true, false, true, false] {
        sync.request_state(target);
        sleep(Duration::from_millis(500)).await;
    }
    sleep(Duration::from_secs(5)).await;

    assert_eq!(api.sent_presets(), vec![Preset::RAISED, Preset::FLAT]);

    let sent = api.sent();
    let gap = sent[1].at - sent[0].at;
    assert!(gap >= Duration::from_secs(5), "trailing send waits for the window: {gap:?}");

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_trailing_only_mode_sends_last_value_after_window() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::trailing_only());

    sync.request_state(true);
    sync.request_state(false);

    sleep(Duration::from_secs(1)).await;
    assert!(api.sent().is_empty());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(api.sent_presets(), vec![Preset::FLAT]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_delay_sets_window() {
    let api = ScriptedApi::new(vec![]);
    let config = SyncConfig::from_send_delay_secs(2.0)
        .unwrap()
        .with_leading_edge(false);
    let (sync, _observer) = synchronizer(&api, config);

    sync.request_state(true);
    sleep(Duration::from_millis(1900)).await;
    assert!(api.sent().is_empty());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missing_foundation_disables_sync() {
    let api = ScriptedApi::new(vec![Reply::NoFoundation]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(sync.poll_once().await, PollOutcome::NoFoundation);
    assert!(!sync.is_supported());
    assert_eq!(sync.state().capability, Capability::Absent);

    assert_eq!(sync.poll_once().await, PollOutcome::Disabled);
    assert_eq!(sync.wait_for_stop().await, MovementOutcome::NoFoundation);

    sync.request_state(true);
    sleep(Duration::from_secs(6)).await;

    assert!(!sync.current_state());
    assert!(api.sent().is_empty());
    assert_eq!(api.status_calls(), 1);
    assert!(observer.seen().is_empty());

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_leaves_state_unchanged() {
    let api = ScriptedApi::new(vec![
        Reply::Status(status(0, 7, false)),
        Reply::Unavailable,
        Reply::Unauthorized,
    ]);
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(sync.poll_once().await, PollOutcome::Updated { raised: true });
    assert_eq!(sync.poll_once().await, PollOutcome::Failed);
    assert_eq!(sync.poll_once().await, PollOutcome::Failed);

    assert!(sync.current_state());
    assert!(sync.is_supported());
    assert_eq!(observer.seen(), vec![true]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_current_state_does_no_io() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    for _ in 0..100 {
        assert!(!sync.current_state());
    }
    sync.request_state(true);
    assert!(sync.current_state());
    assert_eq!(sync.state().source, StateSource::Commanded);

    assert_eq!(api.status_calls(), 0);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_stop_fetches_until_at_rest() {
    let api = ScriptedApi::new(vec![moving(), moving(), moving(), stopped()]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());
    let start = Instant::now();

    assert_eq!(
        sync.wait_for_stop().await,
        MovementOutcome::Stopped { fetches: 4 }
    );
    assert_eq!(api.status_calls(), 4);
    assert!(start.elapsed() >= Duration::from_millis(1500));
    assert!(!sync.state().moving);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_stop_returns_after_one_fetch_when_idle() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(
        sync.wait_for_stop().await,
        MovementOutcome::Stopped { fetches: 1 }
    );
    assert_eq!(api.status_calls(), 1);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_stop_retries_transient_errors() {
    let api = ScriptedApi::new(vec![Reply::Unavailable, moving(), stopped()]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(
        sync.wait_for_stop().await,
        MovementOutcome::Stopped { fetches: 3 }
    );

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_stop_gives_up_after_limit() {
    let api = ScriptedApi::with_fallback(vec![], status(20, 0, true));
    let config = SyncConfig::default()
        .with_movement_wait(Duration::from_millis(500), Duration::from_millis(2200));
    let (sync, _observer) = synchronizer(&api, config);
    let start = Instant::now();

    assert_eq!(
        sync.wait_for_stop().await,
        MovementOutcome::TimedOut { fetches: 5 }
    );
    assert!(start.elapsed() <= Duration::from_millis(2200));

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_stop_stops_on_missing_foundation() {
    let api = ScriptedApi::new(vec![moving(), Reply::NoFoundation]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    assert_eq!(sync.wait_for_stop().await, MovementOutcome::NoFoundation);
    assert!(!sync.is_supported());

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_preset_is_not_retried() {
    let api = ScriptedApi::new(vec![]);
    api.script_presets(vec![Reply::Unavailable]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    sync.request_state(true);
    sleep(Duration::from_secs(30)).await;

    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);
    assert!(sync.current_state());
    assert!(sync.is_supported());

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_same_request_after_failed_preset_is_sent_again() {
    let api = ScriptedApi::new(vec![]);
    api.script_presets(vec![Reply::Unavailable]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    sync.request_state(true);
    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);
    assert!(!sync.state().device_raised);

    sync.request_state(true);
    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED, Preset::RAISED]);
    assert!(sync.state().device_raised);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_ack_does_not_override_newer_request() {
    let api = ScriptedApi::new(vec![]);
    api.set_preset_delay(Duration::from_secs(1));
    let (sync, observer) = synchronizer(&api, SyncConfig::default());

    sync.request_state(true);
    sleep(Duration::from_millis(100)).await;
    sync.request_state(false);

    // The raise is acknowledged after the flatten request
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);
    assert!(!sync.current_state());
    assert!(sync.state().device_raised);
    assert_eq!(observer.seen(), vec![true, false]);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED, Preset::FLAT]);
    assert!(!sync.current_state());
    assert!(!sync.state().device_raised);
    assert_eq!(observer.seen(), vec![true, false]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_preset_without_foundation_disables_sync() {
    let api = ScriptedApi::new(vec![]);
    api.script_presets(vec![Reply::NoFoundation]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default());

    sync.request_state(true);
    sleep(Duration::from_millis(100)).await;
    assert!(!sync.is_supported());

    sync.request_state(false);
    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_right_side_presets_and_positions() {
    let api = ScriptedApi::new(vec![Reply::Status(status(30, 0, false))]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default().with_side(Side::Right));

    // Left head is up, right side is flat
    assert_eq!(sync.poll_once().await, PollOutcome::Updated { raised: false });

    sync.request_state(true);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(api.sent()[0].side, Side::Right);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_movement_before_command_when_enabled() {
    let api = ScriptedApi::new(vec![moving(), stopped()]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::default().with_await_movement(true));

    sync.request_state(true);
    sleep(Duration::from_secs(2)).await;

    assert_eq!(api.status_calls(), 2);
    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_polling_task_refreshes_state() {
    let api = ScriptedApi::new(vec![Reply::Status(status(10, 0, false))]);
    let (mut sync, observer) = synchronizer(&api, SyncConfig::default());
    sync.start_polling();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(api.status_calls(), 0);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(api.status_calls(), 1);
    assert!(sync.current_state());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls(), 2);
    assert!(!sync.current_state());
    assert_eq!(observer.seen(), vec![true, false]);

    let stats = sync.polling_task().unwrap().stats();
    assert_eq!(stats.poll_count, 2);
    assert!(stats.is_running);

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_when_foundation_missing() {
    let api = ScriptedApi::new(vec![Reply::NoFoundation]);
    let (mut sync, _observer) = synchronizer(&api, SyncConfig::default());
    sync.start_polling();

    sleep(Duration::from_secs(45)).await;
    assert_eq!(api.status_calls(), 1);
    assert!(!sync.polling_task().unwrap().is_running());

    sync.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_command() {
    let api = ScriptedApi::new(vec![]);
    let (sync, _observer) = synchronizer(&api, SyncConfig::trailing_only());

    sync.request_state(true);
    sync.shutdown().await.unwrap();

    assert_eq!(api.sent_presets(), vec![Preset::RAISED]);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let api = ScriptedApi::new(vec![]);
    let config = SyncConfig::default().with_poll_interval(Duration::ZERO);

    let result = FoundationSynchronizer::new(api, config, RecordingObserver::new());
    assert!(matches!(result, Err(SyncError::Configuration(_))));
}
