pub mod config;
pub mod db;
pub mod error;
pub mod services;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use srs_core::DueOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::db::SqliteStore;
use crate::services::{StatsScope, StudyService};

/// Maintenance tool for a study database.
#[derive(Debug, Parser)]
#[command(name = "study-service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and repair a spaced-repetition study database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the current due set
    Due { deck_id: Uuid, user_id: Uuid },

    /// Print study statistics
    Stats {
        user_id: Uuid,
        /// Limit statistics to one deck
        deck_id: Option<Uuid>,
    },

    /// Rebuild card states from the review log
    Replay { deck_id: Uuid },
}

pub async fn run() -> anyhow::Result<()> {
    let Cli { command } = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServiceConfig::from_env()?;

    tracing::info!("Opening database at {}", config.database_path.display());
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let service = StudyService::new(Arc::new(store), config)?;

    match command {
        Command::Due { deck_id, user_id } => {
            let due = service.get_due_cards(deck_id, user_id, &DueOptions::default()).await?;
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        Command::Stats { user_id, deck_id } => {
            let scope = StatsScope {
                deck_id,
                window_days: None,
            };
            let report = service.get_study_stats(user_id, scope).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Replay { deck_id } => {
            let rebuilt = service.rebuild_deck(deck_id).await?;
            tracing::info!("Rebuilt {} cards", rebuilt);
        }
    }

    Ok(())
}
