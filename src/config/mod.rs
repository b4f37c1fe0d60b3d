/// Database connection and table creation for the relational store
pub mod database;

/// Debtor/creditor credential table
pub mod identity;

/// `promissoria.toml` loading
pub mod settings;

pub use identity::{CredentialConfig, IdentityTable};
pub use settings::{AppConfig, StorageBackend, load_app_configuration};
