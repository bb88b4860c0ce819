//! Output and logging helpers for the CLI.

use chrono::{DateTime, Utc};
use quickwit_core::Signal;
use quickwit_store::{EndedEvent, Event};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Signal subscriber that records every lifecycle transition in the log.
pub fn log_signal(signal: &Signal) {
    let event = signal.event();
    info!(
        kind = %signal.kind(),
        channel_id = event.channel_id,
        name = %event.name,
        "lifecycle signal"
    );
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Multi-line description of one event and its registrations.
pub fn render_event(event: &Event) -> String {
    let mut out = format!(
        "{name} [{kind}] in channel {channel}\n\
         \x20 organiser:  {organiser}\n\
         \x20 guild:      {guild}\n\
         \x20 start:      {start}\n\
         \x20 end:        {end}\n\
         \x20 reminder:   {reminder}\n",
        name = event.name,
        kind = event.event_type,
        channel = event.channel_id,
        organiser = event.organiser_id,
        guild = event.guild_id,
        start = timestamp(event.utc_start),
        end = timestamp(event.utc_end),
        reminder = timestamp(event.reminder_at),
    );
    if let Some(id) = event.scheduled_event_id {
        out.push_str(&format!("  scheduled:  {id}\n"));
    }
    if !event.description.is_empty() {
        out.push_str(&format!("  about:      {}\n", event.description));
    }

    out.push_str(&format!("  registrations ({}):\n", event.registrations.len()));
    for registration in &event.registrations {
        match &registration.job {
            Some(job) => out.push_str(&format!(
                "    {} {} ({job})\n",
                registration.user_id, registration.status
            )),
            None => out.push_str(&format!(
                "    {} {}\n",
                registration.user_id, registration.status
            )),
        }
    }
    out
}

pub fn render_ended(ended: &EndedEvent) -> String {
    match ended.scheduled_event_id {
        Some(id) => format!(
            "channel {} (guild {}, scheduled event {id})",
            ended.channel_id, ended.guild_id
        ),
        None => format!("channel {} (guild {})", ended.channel_id, ended.guild_id),
    }
}
