//! Event and registration data model.
//!
//! A single [`Event`] type carries an [`EventType`] tag; which jobs (if
//! any) a registration may carry is looked up in [`JOB_TAXONOMY`] rather
//! than encoded in the type system.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
//  Event types and job taxonomy
// ═══════════════════════════════════════════════════════════════════════

/// Category of an event. Determines which job taxonomy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Event")]
    Event,
    #[serde(rename = "Final Fantasy XIV")]
    FinalFantasyXiv,
    #[serde(rename = "Fashion Show")]
    FashionShow,
    #[serde(rename = "Campfire Event")]
    CampfireEvent,
}

impl EventType {
    /// Every supported event type, in presentation order.
    pub const ALL: [EventType; 4] = [
        EventType::Event,
        EventType::FinalFantasyXiv,
        EventType::FashionShow,
        EventType::CampfireEvent,
    ];

    /// The name persisted in the `event_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::FinalFantasyXiv => "Final Fantasy XIV",
            Self::FashionShow => "Fashion Show",
            Self::CampfireEvent => "Campfire Event",
        }
    }

    /// Parse a persisted or user-supplied type name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// The jobs a registration for this type may carry, or `None` when the
    /// type has no job taxonomy.
    pub fn jobs(self) -> Option<&'static [&'static str]> {
        JOB_TAXONOMY
            .iter()
            .find(|(event_type, _)| *event_type == self)
            .map(|(_, jobs)| *jobs)
    }

    /// Look up `job` in this type's taxonomy, returning its canonical
    /// spelling.
    pub fn canonical_job(self, job: &str) -> Option<&'static str> {
        let job = job.trim();
        self.jobs()?
            .iter()
            .copied()
            .find(|j| j.eq_ignore_ascii_case(job))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Platforms cap selection menus at 25 options; the FF14 list is at that cap.
const FF14_JOBS: &[&str] = &[
    "Allrounder",
    "Tank",
    "Healer",
    "DPS",
    "Warrior",
    "Paladin",
    "Dark Knight",
    "Gunbreaker",
    "White Mage",
    "Scholar",
    "Astrologian",
    "Sage",
    "Monk",
    "Dragoon",
    "Ninja",
    "Samurai",
    "Viper",
    "Reaper",
    "Bard",
    "Machinist",
    "Dancer",
    "Black Mage",
    "Summoner",
    "Red Mage",
    "Pictomancer",
];

const FASHION_SHOW_JOBS: &[&str] = &["Crowd", "Model", "Judge"];

const CAMPFIRE_JOBS: &[&str] = &["Crowd", "Speaker"];

/// Event types that carry a job taxonomy, mapped to their permitted jobs.
/// Types absent from this table accept no job at all.
pub static JOB_TAXONOMY: &[(EventType, &[&str])] = &[
    (EventType::FinalFantasyXiv, FF14_JOBS),
    (EventType::FashionShow, FASHION_SHOW_JOBS),
    (EventType::CampfireEvent, CAMPFIRE_JOBS),
];

// ═══════════════════════════════════════════════════════════════════════
//  Registrations
// ═══════════════════════════════════════════════════════════════════════

/// Attendance status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Attending,
    Bench,
    Tentative,
    Late,
}

impl Status {
    /// Every status, in presentation order.
    pub const ALL: [Status; 4] = [
        Status::Attending,
        Status::Bench,
        Status::Tentative,
        Status::Late,
    ];

    /// The name persisted in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attending => "Attending",
            Self::Bench => "Bench",
            Self::Tentative => "Tentative",
            Self::Late => "Late",
        }
    }

    /// Parse a status name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's declared intent to take part in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub user_id: u64,
    pub status: Status,
    /// Only present for event types with a job taxonomy.
    pub job: Option<String>,
}

impl Registration {
    pub fn new(user_id: u64, status: Status) -> Self {
        Self {
            user_id,
            status,
            job: None,
        }
    }

    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════════════

/// A scheduled activity bound to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Primary key; immutable once assigned.
    pub channel_id: u64,
    pub event_type: EventType,
    pub name: String,
    pub description: String,
    pub organiser_id: u64,
    pub utc_start: DateTime<Utc>,
    pub utc_end: DateTime<Utc>,
    pub guild_id: u64,
    /// When the reminder becomes due; never after `utc_start`.
    pub reminder_at: DateTime<Utc>,
    /// Id of the platform-side scheduled event mirroring this one.
    pub scheduled_event_id: Option<u64>,
    /// Ordered by first registration; `user_id` is unique.
    pub registrations: Vec<Registration>,
}

impl Event {
    /// Find the registration for `user_id`.
    pub fn registration(&self, user_id: u64) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.user_id == user_id)
    }

    /// Insert or overwrite a registration in place.
    ///
    /// An existing entry keeps its position. Returns `false` when the
    /// registration was already present with identical data.
    pub fn upsert_registration(&mut self, registration: Registration) -> bool {
        match self
            .registrations
            .iter_mut()
            .find(|r| r.user_id == registration.user_id)
        {
            Some(existing) if *existing == registration => false,
            Some(existing) => {
                *existing = registration;
                true
            }
            None => {
                self.registrations.push(registration);
                true
            }
        }
    }

    /// Remove the registration for `user_id`, returning whether one existed.
    pub fn remove_registration(&mut self, user_id: u64) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.user_id != user_id);
        self.registrations.len() != before
    }
}

/// Identifiers of an event whose end time has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndedEvent {
    pub channel_id: u64,
    pub scheduled_event_id: Option<u64>,
    pub guild_id: u64,
}

// ── tests ────────────────────────────────────────────────────────────
