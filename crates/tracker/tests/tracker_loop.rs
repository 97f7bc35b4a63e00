//! Integration tests for the tracking loop against the mock provider.

use std::sync::Arc;
use std::time::Duration;

use fleetmon_provider_mock::MockProvider;
use fleetmon_tracker::{Error, TickReport, Tracker, TrackerConfig, TrackerState};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(2);

fn fast_config(service: &str) -> TrackerConfig {
    let mut config = TrackerConfig::new(service);
    config.interval = TICK;
    config
}

fn spawn_tracker(
    provider: &MockProvider,
    config: TrackerConfig,
    cancel: &CancellationToken,
) -> (
    mpsc::Receiver<TickReport>,
    tokio::sync::watch::Receiver<TrackerState>,
    tokio::task::JoinHandle<Result<(), Error>>,
) {
    let (tx, rx) = mpsc::channel(16);
    let tracker = Tracker::new(Arc::new(provider.clone()), config, cancel.clone());
    let state = tracker.subscribe_state();
    let handle = tokio::spawn(tracker.run(tx));
    (rx, state, handle)
}

async fn next_report(rx: &mut mpsc::Receiver<TickReport>) -> TickReport {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a tick")
        .expect("tracker stopped before emitting a tick")
}

#[tokio::test]
async fn emits_ticks_until_cancelled_then_stops() {
    let provider = MockProvider::new()
        .with_instance("10.58.1.1", "AuthService", 10, 20)
        .with_instance("10.58.1.2", "AuthService", 30, 40)
        .with_instance("10.58.1.3", "UserService", 50, 60);

    let cancel = CancellationToken::new();
    let (mut rx, mut state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    for _ in 0..2 {
        let report = next_report(&mut rx).await;
        assert_eq!(report.service, "AuthService");
        assert_eq!(report.records.len(), 2);
        assert!(report.records.iter().all(|r| r.healthy));
    }

    cancel.cancel();

    let result = timeout(WAIT, handle)
        .await
        .expect("tracker did not observe cancellation")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(*state.borrow_and_update(), TrackerState::Stopped);

    // The sender side is gone; at most already-buffered ticks remain.
    while rx.try_recv().is_ok() {}
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn absent_service_reports_zero_instances() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "UserService", 10, 20);

    let cancel = CancellationToken::new();
    let (mut rx, _state, handle) = spawn_tracker(&provider, fast_config("GhostService"), &cancel);

    let report = next_report(&mut rx).await;
    assert_eq!(report.service, "GhostService");
    assert!(report.records.is_empty());

    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn discovery_failure_at_startup_is_fatal() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);
    provider.fail_discoveries(1);

    let cancel = CancellationToken::new();
    let (_rx, mut state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    let result = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::Discovery(_))));
    assert_eq!(*state.borrow_and_update(), TrackerState::Stopped);
}

#[tokio::test]
async fn discovery_failure_mid_run_is_retried_next_tick() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);

    let cancel = CancellationToken::new();
    let (mut rx, _state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    next_report(&mut rx).await;
    provider.fail_discoveries(1);

    // One tick is skipped on the failed discovery; the loop keeps going.
    let report = next_report(&mut rx).await;
    assert_eq!(report.records.len(), 1);

    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn instance_that_drops_offline_keeps_its_last_known_name() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);

    let cancel = CancellationToken::new();
    let (mut rx, _state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    let report = next_report(&mut rx).await;
    assert!(report.records[0].reachable);

    // The instance stays discovered but stops answering metric fetches.
    provider.add_unreachable("10.58.1.1");

    let report = loop {
        let report = next_report(&mut rx).await;
        if !report.records.is_empty() && !report.records[0].reachable {
            break report;
        }
    };

    assert_eq!(report.records[0].service, "AuthService");
    assert!(!report.records[0].healthy);

    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn membership_changes_are_picked_up_between_ticks() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);

    let cancel = CancellationToken::new();
    let (mut rx, _state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    let report = next_report(&mut rx).await;
    assert_eq!(report.records.len(), 1);

    provider.add_instance("10.58.1.9", "AuthService", 30, 40);

    let report = loop {
        let report = next_report(&mut rx).await;
        if report.records.len() == 2 {
            break report;
        }
    };
    assert_eq!(report.records[1].address.as_str(), "10.58.1.9");

    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn cancelling_mid_fetch_stops_without_a_partial_tick() {
    let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);
    provider.set_latency("10.58.1.1", Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let (mut rx, mut state, handle) = spawn_tracker(&provider, fast_config("AuthService"), &cancel);

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = timeout(WAIT, handle)
        .await
        .expect("tracker blocked on a hung fetch")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(*state.borrow_and_update(), TrackerState::Stopped);
    assert!(rx.recv().await.is_none(), "a partial tick was emitted");
}
