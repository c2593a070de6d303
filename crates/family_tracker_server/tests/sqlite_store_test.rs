//! Tests for the SQLite tracker store.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::NamedTempFile;

use family_tracker::{
    Action, ActionKind, Actor, DispatchSettings, Dispatcher, HistoryEntry, Mode, Participants,
    PointDirection, RotationInterval, StoreError, TrackerConfig, TrackerId, TrackerState,
    TrackerStore,
};
use family_tracker_server::SqliteStore;

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready store.
fn setup_test_db() -> (NamedTempFile, SqliteStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::open(db_path).expect("Failed to open store");
    (db_file, store)
}

fn tracker_id(raw: i64) -> TrackerId {
    TrackerId::new(raw).expect("Invalid id")
}

fn rotation_config() -> TrackerConfig {
    TrackerConfig::new(
        "Dishes".to_string(),
        Mode::Rotation,
        Some(RotationInterval::Weekly),
        Participants::parse("Jacey, Simon").expect("Invalid roster"),
    )
}

fn entry(second: u32, participant: &str) -> HistoryEntry {
    HistoryEntry::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, second)
            .single()
            .expect("Invalid timestamp"),
        ActionKind::AdvanceTurn,
        Actor::new("mom"),
        participant.to_string(),
        format!("Advanced to {participant}"),
    )
}

#[test]
fn test_missing_tracker_reads_as_none() {
    let (_db, store) = setup_test_db();
    assert!(store.get_tracker(tracker_id(1)).expect("Query failed").is_none());
    assert!(store.get_state(tracker_id(1)).expect("Query failed").is_none());
}

#[test]
fn test_round_trips_config_state_and_history() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(7);
    let config = rotation_config();
    let state = TrackerState::initial(&config);
    assert_eq!(store.save_tracker(id, &config, &state, None), Ok(1));

    let mut state = state;
    state.record(entry(0, "Simon"));
    state.record(entry(1, "Jacey"));
    assert_eq!(store.put_state(id, &state, 1), Ok(2));

    assert_eq!(store.get_tracker(id).expect("Query failed"), Some(config));
    let stored = store
        .get_state(id)
        .expect("Query failed")
        .expect("State missing");
    assert_eq!(*stored.version(), 2);
    assert_eq!(stored.state(), &state);
}

#[test]
fn test_points_table_round_trips() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(2);
    let config = TrackerConfig::new(
        "Scores".to_string(),
        Mode::Points,
        None,
        Participants::parse("Mom, Dad").expect("Invalid roster"),
    );
    store
        .save_tracker(id, &config, &TrackerState::initial(&config), None)
        .expect("Save failed");

    let stored = store
        .get_state(id)
        .expect("Query failed")
        .expect("State missing");
    assert_eq!(stored.state().score("Mom"), Some(0));
    assert_eq!(stored.state().score("Dad"), Some(0));
}

#[test]
fn test_stale_version_is_rejected() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(3);
    let config = rotation_config();
    let state = TrackerState::initial(&config);
    store.save_tracker(id, &config, &state, None).expect("Save failed");
    store.put_state(id, &state, 1).expect("Put failed");

    let err = store.put_state(id, &state, 1).expect_err("Stale put should fail");
    assert_eq!(
        err,
        StoreError::VersionConflict {
            tracker_id: id,
            expected: Some(1)
        }
    );
}

#[test]
fn test_duplicate_create_is_a_conflict() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(4);
    let config = rotation_config();
    let state = TrackerState::initial(&config);
    store.save_tracker(id, &config, &state, None).expect("Save failed");
    let err = store
        .save_tracker(id, &config, &state, None)
        .expect_err("Second create should fail");
    assert!(matches!(err, StoreError::VersionConflict { expected: None, .. }));
}

#[test]
fn test_put_on_missing_tracker_is_not_found() {
    let (_db, store) = setup_test_db();
    let err = store
        .put_state(tracker_id(9), &TrackerState::default(), 1)
        .expect_err("Put should fail");
    assert_eq!(err, StoreError::TrackerNotFound { tracker_id: tracker_id(9) });
}

#[test]
fn test_history_cannot_shrink() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(5);
    let config = rotation_config();
    let mut state = TrackerState::initial(&config);
    state.record(entry(0, "Simon"));
    store.save_tracker(id, &config, &state, None).expect("Save failed");

    let err = store
        .put_state(id, &TrackerState::initial(&config), 1)
        .expect_err("Shrinking put should fail");
    assert!(matches!(
        err,
        StoreError::HistoryRewrite {
            stored: 1,
            proposed: 0,
            ..
        }
    ));
}

#[test]
fn test_update_config_keeps_history() {
    let (_db, store) = setup_test_db();
    let id = tracker_id(6);
    let config = rotation_config();
    let mut state = TrackerState::initial(&config);
    state.record(entry(0, "Simon"));
    store.save_tracker(id, &config, &state, None).expect("Save failed");

    let edited = TrackerConfig::new(
        "Dishes".to_string(),
        Mode::Manual,
        None,
        Participants::parse("Jacey, Simon, Kid").expect("Invalid roster"),
    );
    let next = state.clone().reconfigured(&edited);
    assert_eq!(store.save_tracker(id, &edited, &next, Some(1)), Ok(2));
    assert_eq!(store.get_tracker(id).expect("Query failed"), Some(edited));
    let stored = store
        .get_state(id)
        .expect("Query failed")
        .expect("State missing");
    assert_eq!(stored.state().history().len(), 1);
}

#[test]
fn test_list_returns_every_tracker() {
    let (_db, store) = setup_test_db();
    let config = rotation_config();
    for raw in [3, 1, 2] {
        store
            .save_tracker(tracker_id(raw), &config, &TrackerState::initial(&config), None)
            .expect("Save failed");
    }
    let ids: Vec<_> = store
        .list_trackers()
        .expect("List failed")
        .into_iter()
        .map(|(id, _)| id.get())
        .collect();
    assert_eq!(ids, [1, 2, 3]);
}

#[test]
fn test_dispatch_through_sqlite() {
    let (_db, store) = setup_test_db();
    let dispatcher = Dispatcher::new(Arc::new(store));
    let id = tracker_id(1);
    dispatcher
        .configure(
            id,
            TrackerConfig::new(
                "Scores".to_string(),
                Mode::Points,
                None,
                Participants::parse("Mom, Dad").expect("Invalid roster"),
            ),
        )
        .expect("Configure failed");
    dispatcher
        .dispatch(
            id,
            &Action::UpdatePoints {
                participant: "Dad".to_string(),
                direction: PointDirection::Subtract,
            },
            &Actor::new("mom"),
        )
        .expect("Update failed");

    let view = dispatcher.view(id).expect("View failed");
    assert_eq!(*view.version(), 2);
    assert_eq!(view.history()[0].details(), "Subtract point for Dad");
    assert_eq!(view.history()[0].actor().as_str(), "mom");
}

#[test]
fn test_separate_handles_share_one_database() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    SqliteStore::open(&db_path).expect("Failed to open store");

    let settings = DispatchSettings::default().with_max_attempts(1_000);
    let id = tracker_id(1);
    let first = Dispatcher::with_settings(Arc::new(SqliteStore::new(&db_path)), settings);
    first
        .configure(
            id,
            TrackerConfig::new(
                "Dishes".to_string(),
                Mode::Manual,
                None,
                Participants::parse("A, B").expect("Invalid roster"),
            ),
        )
        .expect("Configure failed");

    let per_side = 10;
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let dispatcher =
                Dispatcher::with_settings(Arc::new(SqliteStore::new(&db_path)), settings);
            thread::spawn(move || {
                for _ in 0..per_side {
                    dispatcher
                        .dispatch(id, &Action::AdvanceTurn, &Actor::guest())
                        .expect("Advance failed");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Worker panicked");
    }

    let view = first.view(id).expect("View failed");
    assert_eq!(view.history().len(), per_side * 2);
    assert_eq!(view.current_participant().as_deref(), Some("A"));
}

#[test]
fn test_configured_busy_timeout_opens_and_migrates() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::new(&db_path).with_busy_timeout(Duration::from_millis(250));
    store.run_migrations().expect("Migrations failed");

    let config = rotation_config();
    store
        .save_tracker(tracker_id(1), &config, &TrackerState::initial(&config), None)
        .expect("Save failed");
    assert_eq!(store.get_tracker(tracker_id(1)).expect("Query failed"), Some(config));
}

#[test]
fn test_state_reads_match_history_under_concurrent_writes() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::open(&db_path).expect("Failed to open store");
    let id = tracker_id(1);
    let dispatcher = Dispatcher::new(Arc::new(store.clone()));
    dispatcher
        .configure(
            id,
            TrackerConfig::new(
                "Dishes".to_string(),
                Mode::Manual,
                None,
                Participants::parse("A, B").expect("Invalid roster"),
            ),
        )
        .expect("Configure failed");

    let advances = 30;
    let writer = thread::spawn(move || {
        for _ in 0..advances {
            dispatcher
                .dispatch(id, &Action::AdvanceTurn, &Actor::guest())
                .expect("Advance failed");
        }
    });

    // Configuration is version 1 with no history; each advance adds one entry.
    let reader = SqliteStore::new(&db_path);
    let read_consistent = || {
        let stored = reader
            .get_state(id)
            .expect("Query failed")
            .expect("State missing");
        assert_eq!(stored.state().history().len() as u64, *stored.version() - 1);
        *stored.version()
    };
    while !writer.is_finished() {
        read_consistent();
    }
    writer.join().expect("Writer panicked");
    assert_eq!(read_consistent(), advances + 1);
}
