//! End-to-end lifecycle: ready, events, departures, lookups, restart


use fakes::{CountingSink, FakeSource, bot_item, item};
use lastmsg::storage::{SinkDocument, read_document, write_document};
use lastmsg::{
    CacheConfig, CacheError, Location, MaintenanceState, ResolvedMessage, Snapshot, Tracker,
    UserId,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_first_run_bootstraps_sink() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lastmsg.json");

    let tracker = Tracker::open(&path, Arc::new(FakeSource::new())).await.unwrap();
    assert!(!path.exists());

    assert_ok!(tracker.on_ready().await);

    let document = read_document(&path).await.unwrap().unwrap();
    assert!(document.locations.is_empty());
    assert_eq!(document.config, CacheConfig::default());
    assert_eq!(tracker.scheduler().state(), MaintenanceState::Waiting);

    assert_ok!(tracker.shutdown().await);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lastmsg.json");

    {
        let tracker = Tracker::open(&path, Arc::new(FakeSource::new())).await.unwrap();
        tracker.on_ready().await.unwrap();
        tracker.on_event(&item(1, 99, 42, "hello")).await;
        tracker.on_event(&item(2, 5, 7, "hi")).await;
        tracker.shutdown().await.unwrap();
    }

    let tracker = Tracker::open(&path, Arc::new(FakeSource::new())).await.unwrap();
    tracker.on_ready().await.unwrap();

    assert_eq!(
        tracker.store().get(&UserId::from(42u64)).await,
        Some(Location::new(1, 99))
    );
    assert_eq!(
        tracker.store().get(&UserId::from(7u64)).await,
        Some(Location::new(2, 5))
    );
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_flat_cache_file_is_kept_and_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, br#"{"maintain_every": 30, "42": [1, 99], "7": [2, 3]}"#).unwrap();

    let tracker = Tracker::open(&path, Arc::new(FakeSource::new())).await.unwrap();
    assert_eq!(tracker.config().maintain_every, 30);
    tracker.on_ready().await.unwrap();
    assert_eq!(tracker.store().len().await, 2);
    tracker.shutdown().await.unwrap();

    let document = read_document(&path).await.unwrap().unwrap();
    assert_eq!(document.config.maintain_every, 30);
    assert_eq!(
        document.locations.get(&UserId::from(42u64)),
        Some(&Location::new(1, 99))
    );
    assert_eq!(document.locations.len(), 2);
    assert!(document.metadata.is_some());
}

#[tokio::test]
async fn test_configuration_read_from_sink() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lastmsg.json");
    let config = CacheConfig::new().maintain_every(5).command_prefix("?");
    write_document(&path, &SinkDocument::new(config.clone(), &Snapshot::default()))
        .await
        .unwrap();

    let tracker = Tracker::open(&path, Arc::new(FakeSource::new())).await.unwrap();

    assert_eq!(tracker.config(), &config);
    assert_eq!(tracker.scheduler().interval(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_corrupt_sink_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lastmsg.json");
    fs::write(&path, b"{ not json").unwrap();

    let result = Tracker::open(&path, Arc::new(FakeSource::new())).await;
    assert!(matches!(result, Err(CacheError::CorruptSnapshot(_))));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let sink = Arc::new(CountingSink::new());
    let result = Tracker::with_sink(
        CacheConfig::new().maintain_every(0),
        sink,
        Arc::new(FakeSource::new()),
    );
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_automated_authors_are_ignored() {
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        Arc::new(CountingSink::new()),
        Arc::new(FakeSource::new()),
    )
    .unwrap();

    assert!(!tracker.on_event(&bot_item(1, 1, 100)).await);
    assert!(tracker.on_event(&item(1, 2, 42, "hello")).await);

    assert!(!tracker.store().has(&UserId::from(100u64)).await);
    assert!(tracker.store().has(&UserId::from(42u64)).await);
}

#[tokio::test]
async fn test_user_left_evicts() {
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        Arc::new(CountingSink::new()),
        Arc::new(FakeSource::new()),
    )
    .unwrap();
    tracker.on_event(&item(1, 2, 42, "hello")).await;

    tracker.on_user_left(&UserId::from(42u64)).await;
    tracker.on_user_left(&UserId::from(42u64)).await;

    assert!(tracker.store().is_empty().await);
    assert_eq!(
        tracker.resolve(&UserId::from(42u64)).await,
        ResolvedMessage::NoLocation
    );
}

#[tokio::test]
async fn test_repeated_ready_keeps_live_table() {
    let sink = Arc::new(CountingSink::new());
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        sink.clone(),
        Arc::new(FakeSource::new()),
    )
    .unwrap();

    tracker.on_ready().await.unwrap();
    tracker.on_event(&item(1, 2, 42, "hello")).await;
    tracker.on_ready().await.unwrap();

    assert!(tracker.store().has(&UserId::from(42u64)).await);
    // Only the first-run bootstrap has been written.
    assert_eq!(sink.saves(), 1);
    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resolve_through_tracker() {
    let source = Arc::new(FakeSource::new());
    source.insert(Location::new(1, 99), Ok(item(1, 99, 42, "hello")));
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        Arc::new(CountingSink::new()),
        source,
    )
    .unwrap();

    tracker.on_event(&item(1, 99, 42, "hello")).await;
    tracker.on_event(&item(1, 100, 43, "gone soon")).await;

    assert!(tracker.resolve(&UserId::from(42u64)).await.is_live());
    assert_eq!(
        tracker.resolve(&UserId::from(43u64)).await,
        ResolvedMessage::LocationStale(Location::new(1, 100))
    );
}

#[tokio::test]
async fn test_shutdown_flushes_latest_events() {
    let sink = Arc::new(CountingSink::new());
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        sink.clone(),
        Arc::new(FakeSource::new()),
    )
    .unwrap();
    tracker.on_ready().await.unwrap();
    tracker.on_event(&item(3, 4, 9, "late")).await;

    tracker.shutdown().await.unwrap();

    let flushed = sink.last().unwrap();
    assert_eq!(flushed.locations.get(&UserId::from(9u64)), Some(&Location::new(3, 4)));
    assert_eq!(tracker.scheduler().state(), MaintenanceState::Idle);
}

#[tokio::test]
async fn test_shutdown_before_ready_is_an_error() {
    let tracker = Tracker::with_sink(
        CacheConfig::default(),
        Arc::new(CountingSink::new()),
        Arc::new(FakeSource::new()),
    )
    .unwrap();
    assert!(matches!(
        tracker.shutdown().await,
        Err(CacheError::MaintenanceError(_))
    ));
}
