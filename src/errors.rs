//! Unified error types for the promissory tracker.
//!
//! Invalid state transitions are not errors: the ledger reports them as an
//! ignored outcome. Everything here is a real failure (I/O, store, relay,
//! platform) that the caller may log, surface, or retry by hand.

use thiserror::Error;

/// All errors raised by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// The contract has not been created yet
    #[error("Contract not initialised")]
    ContractMissing,

    /// Relational store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// The relay answered with a non-2xx status
    #[error("Relay rejected request ({status}): {message}")]
    Relay {
        /// HTTP status returned by the relay
        status: u16,
        /// The `error` field of the reply, or the raw body
        message: String,
    },

    /// The relay could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A push message could not be built or delivered
    #[error("Push delivery error: {message}")]
    Push {
        /// Description from the push service or encoder
        message: String,
    },

    /// The platform declined notification permission
    #[error("Notification permission denied")]
    PermissionDenied,

    /// No active background worker is available
    #[error("Background worker unavailable")]
    WorkerUnavailable,

    /// The platform has no push or worker support at all
    #[error("Push notifications are not supported on this platform")]
    PushUnsupported,

    /// The configured application server key is not a URL-safe base64 P-256 point
    #[error("Invalid VAPID public key")]
    InvalidVapidKey,

    /// Discord framework failure
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
