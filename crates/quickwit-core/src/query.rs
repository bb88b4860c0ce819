//! Temporal queries over the event store.
//!
//! Both queries recompute their candidate set from scratch on every call.
//! Neither remembers what the caller already acted on: reminder delivery
//! keeps its own already-notified set, and ended events stay listed until
//! they are pruned through the coordinator.

use chrono::{DateTime, Utc};
use quickwit_store::{EndedEvent, EventStore};
use tracing::instrument;

use crate::error::CoreResult;

/// Read-only range queries; never touches the cache.
#[derive(Clone)]
pub struct EventQueries {
    store: EventStore,
}

impl EventQueries {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    /// Channels whose reminder is due: `utc_start > now AND reminder_at < now`.
    #[instrument(skip(self))]
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> CoreResult<Vec<u64>> {
        Ok(self.store.query_due_reminders(now).await?)
    }

    /// Events that ended at or before `now`, oldest end first.
    #[instrument(skip(self))]
    pub async fn ended_events(&self, now: DateTime<Utc>) -> CoreResult<Vec<EndedEvent>> {
        Ok(self.store.query_ended(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quickwit_store::{Database, Event, EventType};

    const T0: i64 = 1_900_000_000;

    fn at(offset_minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(T0, 0).unwrap() + Duration::minutes(offset_minutes)
    }

    fn event(channel_id: u64, start_minute: i64) -> Event {
        Event {
            channel_id,
            event_type: EventType::Event,
            name: format!("event {channel_id}"),
            description: String::new(),
            organiser_id: 1,
            utc_start: at(start_minute),
            utc_end: at(start_minute + 60),
            guild_id: 2,
            reminder_at: at(start_minute - 30),
            scheduled_event_id: Some(channel_id * 10),
            registrations: Vec::new(),
        }
    }

    async fn queries_with(events: &[Event]) -> EventQueries {
        let store = EventStore::new(Database::in_memory_migrated().await.unwrap());
        for e in events {
            store.put(e).await.unwrap();
        }
        EventQueries::new(store)
    }

    #[tokio::test]
    async fn due_reminders_excludes_both_boundaries() {
        let queries = queries_with(&[event(1, 0)]).await;

        // reminder_at == now
        assert!(queries.due_reminders(at(-30)).await.unwrap().is_empty());
        // strictly between
        assert_eq!(queries.due_reminders(at(-10)).await.unwrap(), vec![1]);
        // utc_start == now
        assert!(queries.due_reminders(at(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ended_events_include_the_boundary() {
        let queries = queries_with(&[event(1, 0), event(2, 30)]).await;

        assert!(queries.ended_events(at(59)).await.unwrap().is_empty());

        let ended = queries.ended_events(at(60)).await.unwrap();
        assert_eq!(
            ended,
            vec![EndedEvent {
                channel_id: 1,
                scheduled_event_id: Some(10),
                guild_id: 2,
            }]
        );

        let ids: Vec<u64> = queries
            .ended_events(at(200))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.channel_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn queries_do_not_consume_results() {
        let queries = queries_with(&[event(1, 0)]).await;
        assert_eq!(queries.ended_events(at(90)).await.unwrap().len(), 1);
        assert_eq!(queries.ended_events(at(90)).await.unwrap().len(), 1);
        assert_eq!(queries.due_reminders(at(-5)).await.unwrap(), vec![1]);
        assert_eq!(queries.due_reminders(at(-5)).await.unwrap(), vec![1]);
    }
}
