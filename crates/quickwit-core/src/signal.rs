//! Typed lifecycle signals.
//!
//! The coordinator publishes one [`Signal`] per successful mutation to a
//! fixed list of [`SignalSubscriber`]s. Subscribers are registered once,
//! when the [`SignalDispatcher`] is built, and are invoked synchronously
//! in registration order inside the operation that produced the signal.
//!
//! Subscribers must be quick: they run while the event's channel lock is
//! held. Anything slow (network calls to the platform) should be handed
//! off to a task by the subscriber itself.
//!
//! # Usage
//!
//! ```rust
//! # use quickwit_core::signal::{Signal, SignalDispatcher, SignalKind};
//! let dispatcher = SignalDispatcher::builder()
//!     .subscribe(|signal: &Signal| {
//!         if signal.kind() == SignalKind::Deleted {
//!             // tear down the external scheduled event
//!         }
//!     })
//!     .build();
//! assert_eq!(dispatcher.subscriber_count(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use quickwit_store::Event;

/// Which lifecycle transition a signal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Created,
    Altered,
    RegistrationsAltered,
    Deleted,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Altered => "altered",
            Self::RegistrationsAltered => "registrations_altered",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle transition carrying the full event snapshot.
///
/// For `Deleted` the snapshot is the last committed state before removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Created(Event),
    Altered(Event),
    RegistrationsAltered(Event),
    Deleted(Event),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Created(_) => SignalKind::Created,
            Self::Altered(_) => SignalKind::Altered,
            Self::RegistrationsAltered(_) => SignalKind::RegistrationsAltered,
            Self::Deleted(_) => SignalKind::Deleted,
        }
    }

    pub fn event(&self) -> &Event {
        match self {
            Self::Created(event)
            | Self::Altered(event)
            | Self::RegistrationsAltered(event)
            | Self::Deleted(event) => event,
        }
    }
}

/// Receives lifecycle signals.
pub trait SignalSubscriber: Send + Sync {
    fn on_signal(&self, signal: &Signal);
}

impl<F> SignalSubscriber for F
where
    F: Fn(&Signal) + Send + Sync,
{
    fn on_signal(&self, signal: &Signal) {
        self(signal)
    }
}

/// Fixed, ordered fan-out of signals to subscribers.
///
/// Cheaply cloneable; the subscriber list cannot change after
/// [`SignalDispatcherBuilder::build`].
#[derive(Clone, Default)]
pub struct SignalDispatcher {
    subscribers: Arc<[Arc<dyn SignalSubscriber>]>,
}

impl SignalDispatcher {
    pub fn builder() -> SignalDispatcherBuilder {
        SignalDispatcherBuilder::default()
    }

    /// A dispatcher with no subscribers; every signal is dropped.
    pub fn none() -> Self {
        Self::default()
    }

    /// Deliver `signal` to every subscriber, in registration order.
    pub fn dispatch(&self, signal: Signal) {
        tracing::trace!(
            kind = %signal.kind(),
            channel_id = signal.event().channel_id,
            subscribers = self.subscribers.len(),
            "dispatching signal"
        );
        for subscriber in self.subscribers.iter() {
            subscriber.on_signal(&signal);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Builder for [`SignalDispatcher`].
#[derive(Default)]
pub struct SignalDispatcherBuilder {
    subscribers: Vec<Arc<dyn SignalSubscriber>>,
}

impl SignalDispatcherBuilder {
    /// Append a subscriber. Subscribers are called in the order added.
    pub fn subscribe(mut self, subscriber: impl SignalSubscriber + 'static) -> Self {
        self.subscribers.push(Arc::new(subscriber));
        self
    }

    /// Append an already shared subscriber.
    pub fn subscribe_arc(mut self, subscriber: Arc<dyn SignalSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> SignalDispatcher {
        SignalDispatcher {
            subscribers: self.subscribers.into(),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{DateTime, Duration};
    use quickwit_store::EventType;

    fn sample_event() -> Event {
        let start = DateTime::from_timestamp(1_900_000_000, 0).unwrap();
        Event {
            channel_id: 3,
            event_type: EventType::Event,
            name: "Board games".into(),
            description: String::new(),
            organiser_id: 1,
            utc_start: start,
            utc_end: start + Duration::minutes(120),
            guild_id: 2,
            reminder_at: start,
            scheduled_event_id: None,
            registrations: Vec::new(),
        }
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&log);
        let second = Arc::clone(&log);

        let dispatcher = SignalDispatcher::builder()
            .subscribe(move |s: &Signal| first.lock().unwrap().push(format!("a:{}", s.kind())))
            .subscribe(move |s: &Signal| second.lock().unwrap().push(format!("b:{}", s.kind())))
            .build();

        dispatcher.dispatch(Signal::Created(sample_event()));
        dispatcher.dispatch(Signal::Deleted(sample_event()));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:created", "b:created", "a:deleted", "b:deleted"]
        );
    }

    #[test]
    fn dispatch_without_subscribers_is_a_no_op() {
        let dispatcher = SignalDispatcher::none();
        dispatcher.dispatch(Signal::Altered(sample_event()));
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn signal_exposes_snapshot() {
        let signal = Signal::RegistrationsAltered(sample_event());
        assert_eq!(signal.kind(), SignalKind::RegistrationsAltered);
        assert_eq!(signal.event().channel_id, 3);
        assert_eq!(signal.kind().as_str(), "registrations_altered");
    }
}
