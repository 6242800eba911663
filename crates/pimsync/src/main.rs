//! `pimsync` - Replay driver for the reconciliation engine
//!
//! Loads an external store snapshot, synchronizes it into a `SQLite`
//! resource store and replays recorded store changes as notifications.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pimsync_core::{
    MemoryExternalStore, SqliteResourceStore, StoreEvent, SyncSettings, Synchronizer,
};

/// Synchronize an external PIM store into a local resource graph.
#[derive(Debug, Parser)]
#[command(name = "pimsync", version, about)]
struct Cli {
    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resource database (defaults to the user data directory).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enumerate a store snapshot, then replay notifications.
    Sync {
        /// External store snapshot (JSON).
        snapshot: PathBuf,

        /// Recorded store changes to replay after enumeration (JSON array).
        #[arg(long)]
        notifications: Option<PathBuf>,
    },
}

fn default_dir(base: Option<PathBuf>, what: &str) -> Result<PathBuf> {
    let dir = base
        .with_context(|| format!("cannot determine the user {what} directory"))?
        .join("pimsync");
    Ok(dir)
}

fn settings_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(default_dir(dirs::config_dir(), "config")?.join("settings.json")),
    }
}

fn database_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.db {
        Some(path) => Ok(path.clone()),
        None => Ok(default_dir(dirs::data_dir(), "data")?.join("resources.db")),
    }
}

async fn read_events(path: &Path) -> Result<Vec<StoreEvent>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

async fn sync(cli: &Cli, snapshot: &Path, notifications: Option<&Path>) -> Result<()> {
    let settings = SyncSettings::load(&settings_path(cli)?).await?;

    let json = tokio::fs::read_to_string(snapshot)
        .await
        .with_context(|| format!("reading {}", snapshot.display()))?;
    let external = MemoryExternalStore::from_json(&json)?;

    let db = database_path(cli)?;
    if let Some(parent) = db.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_str = db.to_str().context("database path is not valid UTF-8")?;
    let store = SqliteResourceStore::new(db_str).await?;
    info!("resource store at {}", db.display());

    let sync = Synchronizer::new(external, store, settings);
    sync.enumerate_all()?;
    let ran = sync.drain().await;
    info!("enumeration finished after {ran} job(s)");

    if let Some(path) = notifications {
        let events = read_events(path).await?;
        info!("replaying {} change(s)", events.len());
        for event in events {
            match sync.external().apply(event) {
                Ok(notification) => sync.handle_notification(notification)?,
                Err(e) => warn!("change skipped: {e}"),
            }
        }
        let ran = sync.drain().await;
        info!("replay finished after {ran} job(s)");
    }

    if sync.pending_retries() > 0 {
        info!(
            "{} unresolved change(s) abandoned on exit",
            sync.pending_retries()
        );
    }
    sync.shutdown();

    for (resource_type, count) in sync.store().count_by_type().await? {
        println!("{resource_type:<16} {count}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pimsync=info,pimsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Sync {
            snapshot,
            notifications,
        } => sync(&cli, snapshot, notifications.as_deref()).await,
    }
}
