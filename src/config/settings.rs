//! Application settings loaded from `promissoria.toml`.
//!
//! Every section has defaults so an empty file yields a runnable local setup.
//! Secrets never live here: the bot token and the VAPID private key are read
//! from the environment at the point of use.

use crate::config::identity::CredentialConfig;
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default config path, overridable with `PROMISSORIA_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "promissoria.toml";

/// Root of `promissoria.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Debtor credential record
    #[serde(default = "CredentialConfig::default_debtor")]
    pub debtor: CredentialConfig,
    /// Creditor credential record
    #[serde(default = "CredentialConfig::default_creditor")]
    pub creditor: CredentialConfig,
    /// Installment schedule used when the contract is first created
    #[serde(default)]
    pub contract: ContractConfig,
    /// Which persistence adapter to use
    #[serde(default)]
    pub storage: StorageConfig,
    /// Reminder scheduler
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// Notification feed refresh
    #[serde(default)]
    pub feed: FeedConfig,
    /// Relay server and client
    #[serde(default)]
    pub relay: RelayConfig,
    /// Web push
    #[serde(default)]
    pub push: PushConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debtor: CredentialConfig::default_debtor(),
            creditor: CredentialConfig::default_creditor(),
            contract: ContractConfig::default(),
            storage: StorageConfig::default(),
            reminders: ReminderConfig::default(),
            feed: FeedConfig::default(),
            relay: RelayConfig::default(),
            push: PushConfig::default(),
        }
    }
}

/// Installment schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Number of installments
    pub installments: u32,
    /// Amount of each installment
    pub installment_amount: f64,
    /// Due date of installment #1; the rest follow monthly on the same day
    pub first_due_date: NaiveDate,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            installments: 20,
            installment_amount: 1000.0,
            first_due_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap_or_default(),
        }
    }
}

/// Persistence adapter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON key-value file, no realtime
    #[default]
    Local,
    /// Relational store with realtime change events
    Remote,
}

/// Storage section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Adapter to use
    pub backend: StorageBackend,
    /// File backing the local adapter
    pub path: String,
    /// Connection string for the remote adapter; `DATABASE_URL` wins if set
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            path: "data/promissoria.json".to_string(),
            database_url: "sqlite://data/promissoria.sqlite?mode=rwc".to_string(),
        }
    }
}

impl StorageConfig {
    /// Database URL with the environment override applied.
    #[must_use]
    pub fn resolved_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database_url.clone())
    }
}

/// Reminder scheduler section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Seconds between runs
    pub interval_secs: u64,
    /// How far ahead a due date triggers a reminder
    pub lookahead_days: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
            lookahead_days: 3,
        }
    }
}

/// Largest accepted `lookahead_days`.
pub const MAX_LOOKAHEAD_DAYS: i64 = 366;

impl ReminderConfig {
    /// Interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Lookahead window, or `None` when `lookahead_days` is out of range.
    #[must_use]
    pub fn lookahead(&self) -> Option<chrono::TimeDelta> {
        (0..=MAX_LOOKAHEAD_DAYS)
            .contains(&self.lookahead_days)
            .then(|| chrono::TimeDelta::try_days(self.lookahead_days))
            .flatten()
    }
}

/// Feed section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Polling period used when the store has no realtime channel
    pub poll_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl FeedConfig {
    /// Poll period as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Relay section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay server binds to; no server when absent
    pub bind: Option<String>,
    /// URL clients post relay requests to; push channel disabled when absent
    pub url: Option<String>,
}

/// Push section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Application server public key, URL-safe base64
    pub vapid_public_key: String,
    /// VAPID `sub` claim
    pub subject: String,
    /// Only subscribe devices running the installed app
    pub require_standalone: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_public_key: String::new(),
            subject: "mailto:admin@promissoria.app".to_string(),
            require_standalone: true,
        }
    }
}

/// Parses configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse promissoria.toml: {e}"),
    })?;
    if config.reminders.lookahead().is_none() {
        return Err(Error::Config {
            message: format!(
                "reminders.lookahead_days must be between 0 and {MAX_LOOKAHEAD_DAYS}, got {}",
                config.reminders.lookahead_days
            ),
        });
    }
    Ok(config)
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `PROMISSORIA_CONFIG` or the default path, falling
/// back to built-in defaults when the file does not exist.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("PROMISSORIA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        let config = load_config(&path)?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    } else {
        tracing::warn!("No configuration file at {}, using defaults", path);
        Ok(AppConfig::default())
    }
}
