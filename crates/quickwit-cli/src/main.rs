//! CLI entry point for QuickWit event storage.
//!
//! This binary provides the `quickwit` command with maintenance
//! subcommands over the event store: pruning ended events, listing
//! temporal query results, inspecting one event, and setting a user's
//! timezone.

mod config;
mod helpers;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use quickwit_core::{EventCoordinator, SignalDispatcher};
use quickwit_store::Database;
use tracing::info;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::helpers::{init_tracing, log_signal, render_ended, render_event};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// QuickWit — event storage maintenance.
#[derive(Parser)]
#[command(
    name = "quickwit",
    version,
    about = "QuickWit — event storage maintenance",
    long_about = "Operator commands for the QuickWit event store: prune ended events, \
                  inspect reminders and events, and manage user timezones."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every event whose end time has passed.
    Prune,

    /// List events whose end time has passed.
    Ended,

    /// List events whose reminder is due now.
    Reminders,

    /// Show one event and its registrations.
    Show {
        /// Channel hosting the event.
        channel_id: u64,
    },

    /// Set a user's timezone (IANA name, e.g. Europe/Amsterdam).
    Timezone {
        user_id: u64,
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    init_tracing(&config.logging.level);

    let coordinator = open_coordinator(&config).await?;

    match cli.command {
        Commands::Prune => cmd_prune(&coordinator).await,
        Commands::Ended => cmd_ended(&coordinator).await,
        Commands::Reminders => cmd_reminders(&coordinator).await,
        Commands::Show { channel_id } => cmd_show(&coordinator, channel_id).await,
        Commands::Timezone { user_id, name } => cmd_timezone(&coordinator, user_id, &name).await,
    }
}

async fn open_coordinator(config: &AppConfig) -> Result<EventCoordinator> {
    let path = config.storage.database_path.clone();
    let db = Database::open_and_migrate(path.clone())
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    info!(path = %path.display(), "store initialized");

    let signals = SignalDispatcher::builder().subscribe(log_signal).build();
    Ok(EventCoordinator::with_database(
        db,
        signals,
        config.events.clone(),
    ))
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_prune(coordinator: &EventCoordinator) -> Result<()> {
    let pruned = coordinator.prune().await.context("prune failed")?;
    println!("Pruned {pruned} ended event(s).");
    Ok(())
}

async fn cmd_ended(coordinator: &EventCoordinator) -> Result<()> {
    let ended = coordinator
        .ended_events(Utc::now())
        .await
        .context("failed to query ended events")?;
    if ended.is_empty() {
        println!("No ended events.");
    }
    for event in &ended {
        println!("{}", render_ended(event));
    }
    Ok(())
}

async fn cmd_reminders(coordinator: &EventCoordinator) -> Result<()> {
    let due = coordinator
        .due_reminders(Utc::now())
        .await
        .context("failed to query due reminders")?;
    if due.is_empty() {
        println!("No reminders due.");
    }
    for channel_id in due {
        println!("channel {channel_id}");
    }
    Ok(())
}

async fn cmd_show(coordinator: &EventCoordinator, channel_id: u64) -> Result<()> {
    match coordinator
        .get(channel_id)
        .await
        .context("failed to load event")?
    {
        Some(event) => print!("{}", render_event(&event)),
        None => println!("No event in channel {channel_id}."),
    }
    Ok(())
}

async fn cmd_timezone(coordinator: &EventCoordinator, user_id: u64, name: &str) -> Result<()> {
    match coordinator.set_timezone(user_id, name).await {
        Ok(tz) => {
            println!("Timezone for user {user_id} set to {}.", tz.name());
            Ok(())
        }
        Err(err) if err.is_user_error() => {
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err).context("failed to set timezone"),
    }
}
