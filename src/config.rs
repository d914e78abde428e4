//! Server configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_HISTORY_LIMIT: usize = 200;
pub const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_RENUMBER_RETRIES: usize = 3;
pub const DEFAULT_RENUMBER_RETRY_BASE_MS: u64 = 50;

/// Tuning for the per-controller persistence writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistConfig {
    /// Bounded queue between a controller and its writer task.
    pub queue_capacity: usize,
    /// Attempts at repairing board indices after a failed delete.
    pub renumber_retries: usize,
    /// Base delay for linear back-off between repair attempts.
    pub renumber_retry_base_ms: u64,
}

impl PersistConfig {
    #[must_use]
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        Duration::from_millis((attempt as u64).saturating_mul(self.renumber_retry_base_ms))
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_PERSIST_QUEUE_CAPACITY,
            renumber_retries: DEFAULT_RENUMBER_RETRIES,
            renumber_retry_base_ms: DEFAULT_RENUMBER_RETRY_BASE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Absent means boards are kept in process memory only.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Per-board history cap; `None` keeps every entry.
    pub history_limit: Option<usize>,
    pub persist: PersistConfig,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory storage when absent
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `HISTORY_LIMIT`: default 200, `0` disables the cap
    /// - `PERSIST_QUEUE_CAPACITY`: default 256
    /// - `RENUMBER_RETRIES`: default 3
    /// - `RENUMBER_RETRY_BASE_MS`: default 50
    #[must_use]
    pub fn from_env() -> Self {
        let history_limit = env_parse("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT);
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            history_limit: (history_limit > 0).then_some(history_limit),
            persist: PersistConfig {
                queue_capacity: env_parse("PERSIST_QUEUE_CAPACITY", DEFAULT_PERSIST_QUEUE_CAPACITY).max(1),
                renumber_retries: env_parse("RENUMBER_RETRIES", DEFAULT_RENUMBER_RETRIES),
                renumber_retry_base_ms: env_parse("RENUMBER_RETRY_BASE_MS", DEFAULT_RENUMBER_RETRY_BASE_MS),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            persist: PersistConfig::default(),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
