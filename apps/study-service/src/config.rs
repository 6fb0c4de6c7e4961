//! Service configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Runtime configuration for the study service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    /// Scheduler name, resolved with `srs_core::get_algorithm`.
    pub algorithm: String,
    /// Bound for due-set, session-start and stats queries.
    pub query_timeout: Duration,
    /// Bound for a single review commit.
    pub commit_timeout: Duration,
    /// Window used by stats queries that do not name one.
    pub stats_window_days: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("study.db"),
            algorithm: "sm2".to_string(),
            query_timeout: Duration::from_millis(5_000),
            commit_timeout: Duration::from_millis(5_000),
            stats_window_days: 30,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// Recognised variables:
    /// - DATABASE_PATH: SQLite file
    /// - SCHEDULER: scheduling algorithm name
    /// - QUERY_TIMEOUT_MS / COMMIT_TIMEOUT_MS: timeouts in milliseconds
    /// - STATS_WINDOW_DAYS: default stats window
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => {
                    let ms: u64 = raw
                        .parse()
                        .with_context(|| format!("{key} must be a number of milliseconds, got {raw:?}"))?;
                    Ok(Duration::from_millis(ms))
                }
                None => Ok(default),
            }
        };

        let query_timeout = millis("QUERY_TIMEOUT_MS", defaults.query_timeout)?;
        let commit_timeout = millis("COMMIT_TIMEOUT_MS", defaults.commit_timeout)?;

        let stats_window_days = match lookup("STATS_WINDOW_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("STATS_WINDOW_DAYS must be a number of days, got {raw:?}"))?,
            None => defaults.stats_window_days,
        };

        Ok(Self {
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            algorithm: lookup("SCHEDULER").unwrap_or(defaults.algorithm),
            query_timeout,
            commit_timeout,
            stats_window_days,
        })
    }
}
