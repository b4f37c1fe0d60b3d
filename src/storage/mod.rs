//! Storage port - one interface, two interchangeable adapters.
//!
//! The ledger, dispatcher and relay are written once against [`Storage`].
//! [`LocalStore`] keeps everything in a JSON key-value file and offers no
//! realtime channel; [`RemoteStore`] uses the relational layout and publishes
//! [`StoreEvent`]s so connected clients observe writes directly.

use crate::{
    config::{AppConfig, StorageBackend, database},
    errors::Result,
    models::{Contract, Installment, Notification, PushSubscription, User},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// JSON key-value adapter
pub mod local;
/// Relational adapter with realtime events
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

/// Change published by stores that support realtime subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A notification row was inserted
    NotificationCreated(Notification),
    /// Notifications of this user were marked read or cleared
    NotificationsChanged {
        /// Affected user id
        user_id: String,
    },
    /// An installment was written
    InstallmentUpdated(Installment),
    /// Contract-level fields (PIX key, whole aggregate) were written
    ContractUpdated,
}

/// Persistence operations needed by the core.
///
/// Installment writes are all-or-nothing per installment. No cross-call
/// transactions are offered; concurrent writers resolve last-write-wins.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The contract aggregate, or `None` before first initialisation.
    async fn load_contract(&self) -> Result<Option<Contract>>;

    /// Writes the whole aggregate, replacing any previous one.
    async fn save_contract(&self, contract: &Contract) -> Result<()>;

    /// Replaces the stored installment with the same id.
    async fn save_installment(&self, installment: &Installment) -> Result<()>;

    /// Sets or clears the creditor's payment-routing key on the contract.
    async fn set_creditor_pix_key(&self, pix_key: Option<&str>) -> Result<()>;

    /// Stored user record.
    async fn load_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Creates or replaces a user record.
    async fn save_user(&self, user: &User) -> Result<()>;

    /// Appends a notification.
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Notifications targeted at `user_id`, newest first.
    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>>;

    /// Flips the read flag. Returns `false` when no such notification exists.
    async fn mark_notification_read(&self, notification_id: &str) -> Result<bool>;

    /// Deletes every notification of `user_id`. Returns how many were removed.
    async fn clear_notifications(&self, user_id: &str) -> Result<u64>;

    /// Inserts or replaces the subscription keyed by `(user_id, endpoint)`.
    async fn upsert_push_subscription(&self, subscription: &PushSubscription) -> Result<()>;

    /// All subscriptions of `user_id`.
    async fn push_subscriptions_for(&self, user_id: &str) -> Result<Vec<PushSubscription>>;

    /// Removes the subscription keyed by `(user_id, endpoint)`. Returns rows removed.
    async fn delete_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<u64>;

    /// Realtime change stream, if this adapter has one.
    fn changes(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        None
    }
}

/// Opens the adapter selected in configuration.
pub async fn open_storage(config: &AppConfig) -> Result<Arc<dyn Storage>> {
    match config.storage.backend {
        StorageBackend::Local => {
            tracing::info!("Using local key-value store at {}", config.storage.path);
            Ok(Arc::new(LocalStore::open(&config.storage.path).await?))
        }
        StorageBackend::Remote => {
            let url = config.storage.resolved_database_url();
            tracing::info!("Using relational store at {}", url);
            let db = database::create_connection(&url).await?;
            database::create_tables(&db).await?;
            Ok(Arc::new(RemoteStore::new(db)))
        }
    }
}
