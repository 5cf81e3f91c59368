//! Configuration loading and representation.
//!
//! Read from the process environment:
//!
//! - `USE_PERSISTENT_STORES`: `true` selects Postgres, `false` or unset does not;
//!   any other value is rejected with [`ConfigError::Invalid`]
//! - `DATABASE_URL`: Postgres connection string, required when persistent
//! - `DATABASE_MAX_CONNECTIONS`: positive pool size (default 5)
//! - `BATCHALLOC_STATE_FILE`: JSON file holding batches when not persistent
//!
//! With neither Postgres nor a state file, batches live in memory for the
//! lifetime of the process only.

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error(
        "no durable store configured; set BATCHALLOC_STATE_FILE or USE_PERSISTENT_STORES=true"
    )]
    NotDurable,
}

/// Where batches live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    File { path: PathBuf },
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (tests, embedding).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_persistent = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                value: raw,
            })?,
        };

        if !use_persistent {
            let store = match lookup("BATCHALLOC_STATE_FILE").filter(|p| !p.trim().is_empty()) {
                Some(path) => StoreConfig::File { path: path.into() },
                None => StoreConfig::InMemory,
            };
            return Ok(Self { store });
        }

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                    });
                }
            },
        };

        Ok(Self {
            store: StoreConfig::Postgres {
                database_url,
                max_connections,
            },
        })
    }

    /// Point the store at a state file, unless Postgres is configured.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        if !matches!(self.store, StoreConfig::Postgres { .. }) {
            self.store = StoreConfig::File { path: path.into() };
        }
        self
    }

    /// Fails when batches would not outlive the process.
    pub fn ensure_durable(&self) -> Result<(), ConfigError> {
        match self.store {
            StoreConfig::InMemory => Err(ConfigError::NotDurable),
            _ => Ok(()),
        }
    }
}
