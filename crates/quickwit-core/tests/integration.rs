//! Integration tests for the quickwit-core crate.
//!
//! Drives the coordinator against an on-disk SQLite database (via
//! tempfile) and checks that both tiers agree after every operation,
//! including across a restart with a cold cache.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use quickwit_core::{
    CoordinatorConfig, EventCoordinator, EventEdit, NewEvent, Signal, SignalDispatcher, SignalKind,
};
use quickwit_store::{Database, EventStore, Registration, Status};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 9, 0, 0).unwrap()
}

fn new_event(channel_id: u64) -> NewEvent {
    NewEvent {
        channel_id,
        guild_id: 1,
        organiser_id: 10,
        event_type: Some("Fashion Show".into()),
        name: "Spring gala".into(),
        description: "Theme: flowers".into(),
        start: "15/03/2030 19:00".into(),
        duration_minutes: Some(120),
        reminder_minutes: Some(60),
    }
}

async fn open(path: std::path::PathBuf, dispatcher: SignalDispatcher) -> (EventCoordinator, EventStore) {
    let db = Database::open_and_migrate(path).await.unwrap();
    (
        EventCoordinator::with_database(db.clone(), dispatcher, CoordinatorConfig::default()),
        EventStore::new(db),
    )
}

#[tokio::test]
async fn full_lifecycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let dispatcher = SignalDispatcher::builder()
        .subscribe(move |s: &Signal| sink.lock().unwrap().push(s.kind()))
        .build();
    let (coordinator, store) = open(dir.path().join("events.db"), dispatcher).await;

    let created = coordinator.create_at(new_event(1), now()).await.unwrap();
    coordinator
        .register(1, Registration::new(2, Status::Attending).with_job("model"))
        .await
        .unwrap();
    coordinator
        .register(1, Registration::new(3, Status::Tentative))
        .await
        .unwrap();
    let edited = coordinator
        .edit_at(
            1,
            10,
            EventEdit {
                start: Some("15/03/2030 20:00".into()),
                ..Default::default()
            },
            now(),
        )
        .await
        .unwrap();

    assert_eq!(edited.utc_start - created.utc_start, chrono::Duration::hours(1));
    assert_eq!(edited.utc_end - edited.utc_start, chrono::Duration::minutes(120));
    assert_eq!(edited.utc_start - edited.reminder_at, chrono::Duration::minutes(60));
    assert_eq!(edited.registrations.len(), 2);

    // Both tiers agree.
    assert_eq!(store.get(1).await.unwrap(), Some(edited.clone()));
    assert_eq!(coordinator.cache().get(1).await, Some(edited.clone()));

    let pruned = coordinator.prune_at(edited.utc_end).await.unwrap();
    assert_eq!(pruned, 1);
    assert!(store.get(1).await.unwrap().is_none());

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            SignalKind::Created,
            SignalKind::RegistrationsAltered,
            SignalKind::RegistrationsAltered,
            SignalKind::Altered,
            SignalKind::Deleted,
        ]
    );
}

#[tokio::test]
async fn state_survives_restart_with_cold_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");

    let expected = {
        let (coordinator, _) = open(path.clone(), SignalDispatcher::none()).await;
        coordinator.set_timezone(10, "America/New_York").await.unwrap();
        coordinator.create_at(new_event(1), now()).await.unwrap();
        coordinator
            .register(1, Registration::new(2, Status::Late))
            .await
            .unwrap()
    };

    let (coordinator, _) = open(path, SignalDispatcher::none()).await;
    assert!(coordinator.cache().get(1).await.is_none());
    assert_eq!(coordinator.get(1).await.unwrap(), Some(expected));
    assert_eq!(coordinator.cache().stats().hits(), 0);
    assert_eq!(
        coordinator.timezone(10).await.unwrap(),
        chrono_tz::Tz::America__New_York
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_reads_and_writes_stay_coherent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");
    {
        let (coordinator, _) = open(path.clone(), SignalDispatcher::none()).await;
        coordinator.create_at(new_event(1), now()).await.unwrap();
    }

    // Cold cache: readers race the writers for the first repopulation.
    let (coordinator, store) = open(path, SignalDispatcher::none()).await;
    let mut handles = Vec::new();
    for user in 0..10u64 {
        let writer = coordinator.clone();
        handles.push(tokio::spawn(async move {
            writer
                .register(1, Registration::new(user, Status::Attending))
                .await
                .unwrap();
        }));
        let reader = coordinator.clone();
        handles.push(tokio::spawn(async move {
            reader.get(1).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = store.get(1).await.unwrap().unwrap();
    assert_eq!(stored.registrations.len(), 10);
    assert_eq!(coordinator.cache().get(1).await, Some(stored));
}
