use super::*;
use chrono::Duration;

const T0: i64 = 1_900_000_000;

async fn setup_store() -> EventStore {
    let db = Database::in_memory_migrated().await.unwrap();
    EventStore::new(db)
}

fn at(offset_minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(T0, 0).unwrap() + Duration::minutes(offset_minutes)
}

/// Event starting at `start` minutes after T0, reminder 30 minutes
/// earlier, lasting 60 minutes.
fn event_at(channel_id: u64, start: i64) -> Event {
    Event {
        channel_id,
        event_type: EventType::FinalFantasyXiv,
        name: format!("event {channel_id}"),
        description: "bring food".into(),
        organiser_id: 500,
        utc_start: at(start),
        utc_end: at(start + 60),
        guild_id: 7,
        reminder_at: at(start - 30),
        scheduled_event_id: None,
        registrations: Vec::new(),
    }
}

#[tokio::test]
async fn put_and_get_round_trip() {
    let store = setup_store().await;
    let mut event = event_at(1, 0);
    event.scheduled_event_id = Some(12345);
    event.registrations = vec![
        Registration::new(20, Status::Attending).with_job("Tank"),
        Registration::new(10, Status::Tentative),
    ];

    store.put(&event).await.unwrap();
    let fetched = store.get(1).await.unwrap().unwrap();
    assert_eq!(fetched, event);
}

#[tokio::test]
async fn get_missing_returns_none() {
    let store = setup_store().await;
    assert!(store.get(404).await.unwrap().is_none());
}

#[tokio::test]
async fn put_is_an_idempotent_upsert() {
    let store = setup_store().await;
    let mut event = event_at(1, 0);
    event.registrations = vec![Registration::new(20, Status::Attending)];
    store.put(&event).await.unwrap();
    store.put(&event).await.unwrap();

    event.name = "renamed".into();
    event.registrations = vec![Registration::new(30, Status::Bench)];
    store.put(&event).await.unwrap();

    let fetched = store.get(1).await.unwrap().unwrap();
    assert_eq!(fetched.name, "renamed");
    assert_eq!(fetched.registrations, vec![Registration::new(30, Status::Bench)]);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn put_collapses_duplicate_user_ids() {
    let store = setup_store().await;
    let mut event = event_at(1, 0);
    event.registrations = vec![
        Registration::new(20, Status::Attending),
        Registration::new(20, Status::Late),
    ];
    store.put(&event).await.unwrap();

    let fetched = store.get(1).await.unwrap().unwrap();
    assert_eq!(fetched.registrations, vec![Registration::new(20, Status::Late)]);
}

#[tokio::test]
async fn delete_cascades_and_is_idempotent() {
    let store = setup_store().await;
    let mut event = event_at(1, 0);
    event.registrations = vec![Registration::new(20, Status::Attending)];
    store.put(&event).await.unwrap();

    assert!(store.delete(1).await.unwrap());
    assert!(!store.delete(1).await.unwrap());
    assert!(store.get(1).await.unwrap().is_none());
    assert!(store.registered_event_ids(20).await.unwrap().is_empty());
}

#[tokio::test]
async fn registration_upsert_keeps_position() {
    let store = setup_store().await;
    store.put(&event_at(1, 0)).await.unwrap();

    store
        .put_registration(1, &Registration::new(20, Status::Attending))
        .await
        .unwrap();
    store
        .put_registration(1, &Registration::new(30, Status::Bench))
        .await
        .unwrap();
    store
        .put_registration(1, &Registration::new(20, Status::Late))
        .await
        .unwrap();

    let fetched = store.get(1).await.unwrap().unwrap();
    assert_eq!(
        fetched.registrations,
        vec![
            Registration::new(20, Status::Late),
            Registration::new(30, Status::Bench),
        ]
    );
}

#[tokio::test]
async fn registration_for_missing_event_is_not_found() {
    let store = setup_store().await;
    let err = store
        .put_registration(1, &Registration::new(20, Status::Attending))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "event", .. }));
}

#[tokio::test]
async fn delete_registration_twice_is_harmless() {
    let store = setup_store().await;
    store.put(&event_at(1, 0)).await.unwrap();
    store
        .put_registration(1, &Registration::new(20, Status::Attending))
        .await
        .unwrap();

    assert!(store.delete_registration(1, 20).await.unwrap());
    assert!(!store.delete_registration(1, 20).await.unwrap());
    assert!(store.get(1).await.unwrap().unwrap().registrations.is_empty());
}

#[tokio::test]
async fn ended_query_includes_exact_end() {
    let store = setup_store().await;
    // Ends at +60, +120 and +180 minutes.
    store.put(&event_at(1, 0)).await.unwrap();
    store.put(&event_at(2, 60)).await.unwrap();
    let mut linked = event_at(3, 120);
    linked.scheduled_event_id = Some(900);
    store.put(&linked).await.unwrap();

    let ended = store.query_ended(at(120)).await.unwrap();
    let ids: Vec<u64> = ended.iter().map(|e| e.channel_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(ended[0].guild_id, 7);

    let ended = store.query_ended(at(180)).await.unwrap();
    assert_eq!(ended.len(), 3);
    assert_eq!(ended[2].scheduled_event_id, Some(900));

    assert!(store.query_ended(at(59)).await.unwrap().is_empty());
}

#[tokio::test]
async fn due_reminder_boundaries_are_strict() {
    let store = setup_store().await;
    // start = +60, reminder = +30
    store.put(&event_at(1, 60)).await.unwrap();

    // Before the reminder instant.
    assert!(store.query_due_reminders(at(29)).await.unwrap().is_empty());
    // Exactly at the reminder instant.
    assert!(store.query_due_reminders(at(30)).await.unwrap().is_empty());
    // Between reminder and start.
    assert_eq!(store.query_due_reminders(at(31)).await.unwrap(), vec![1]);
    // Exactly at the start.
    assert!(store.query_due_reminders(at(60)).await.unwrap().is_empty());
    // After the start.
    assert!(store.query_due_reminders(at(61)).await.unwrap().is_empty());
}

#[tokio::test]
async fn registered_event_ids_lists_every_event() {
    let store = setup_store().await;
    store.put(&event_at(1, 0)).await.unwrap();
    store.put(&event_at(2, 0)).await.unwrap();
    store.put(&event_at(3, 0)).await.unwrap();
    for channel_id in [1, 3] {
        store
            .put_registration(channel_id, &Registration::new(20, Status::Attending))
            .await
            .unwrap();
    }

    assert_eq!(store.registered_event_ids(20).await.unwrap(), vec![1, 3]);
    assert!(store.registered_event_ids(21).await.unwrap().is_empty());
}

#[tokio::test]
async fn scheduled_event_link() {
    let store = setup_store().await;
    store.put(&event_at(1, 0)).await.unwrap();

    assert!(store.set_scheduled_event_id(1, Some(777)).await.unwrap());
    assert_eq!(store.find_by_scheduled_event(777).await.unwrap(), Some(1));
    assert_eq!(
        store.get(1).await.unwrap().unwrap().scheduled_event_id,
        Some(777)
    );

    assert!(store.set_scheduled_event_id(1, None).await.unwrap());
    assert!(store.find_by_scheduled_event(777).await.unwrap().is_none());
    assert!(!store.set_scheduled_event_id(2, Some(1)).await.unwrap());
}

#[tokio::test]
async fn corrupt_event_type_is_a_storage_error() {
    let db = Database::in_memory_migrated().await.unwrap();
    db.execute(|conn| {
        conn.execute(
            "INSERT INTO events (channel_id, event_type, name, description, organiser_id, \
             utc_start, utc_end, guild_id, reminder_at) \
             VALUES (1, 'Bowling Night', 'x', '', 1, 100, 200, 1, 50)",
            [],
        )?;
        Ok(())
    })
    .await
    .unwrap();

    let store = EventStore::new(db);
    let err = store.get(1).await.unwrap_err();
    assert!(matches!(err, StoreError::CorruptRow { table: "events", .. }));
}

#[tokio::test]
async fn oversized_ids_are_rejected() {
    let store = setup_store().await;
    let event = event_at(u64::MAX, 0);
    assert!(matches!(
        store.put(&event).await,
        Err(StoreError::InvalidArgument(_))
    ));
}
