//! Notification dispatcher.
//!
//! `notify` persists one notification row and then fans it out:
//!
//! 1. **In-app** - the persisted row itself; it shows up in the recipient's feed.
//! 2. **Realtime** - stores with a change stream publish the insert, so a
//!    connected client sees it without polling (see [`crate::observer`]).
//! 3. **Push relay** - the relay is asked to push the message to every device
//!    the recipient registered.
//!
//! Only the first step can fail the call. Relay failures are logged and
//! reported in the [`DeliveryReport`], never propagated. There is no dedup: two
//! calls produce two notifications.

use crate::{
    errors::Result,
    models::{Notification, NotificationType, Role},
    relay::{RelayApi, SendRequest},
    storage::Storage,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Title, body and recipient of a notification before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    /// Recipient
    pub target: Role,
    /// Short title
    pub title: String,
    /// Body text
    pub body: String,
    /// Kind
    pub kind: NotificationType,
}

impl NotificationMessage {
    /// Sent to the creditor when the debtor marks installment `number` paid.
    #[must_use]
    pub fn payment_marked(number: u32) -> Self {
        Self {
            target: Role::Creditor,
            title: "💰 Payment made!".to_string(),
            body: format!(
                "Installment {number} was marked as paid. Please confirm receipt."
            ),
            kind: NotificationType::PaymentMarked,
        }
    }

    /// Sent to the debtor when the creditor confirms installment `number`.
    #[must_use]
    pub fn payment_confirmed(number: u32) -> Self {
        Self {
            target: Role::Debtor,
            title: "✅ Payment confirmed!".to_string(),
            body: format!("The creditor confirmed receipt of installment {number}."),
            kind: NotificationType::PaymentConfirmed,
        }
    }

    /// Sent to the debtor ahead of a due date.
    #[must_use]
    pub fn reminder(number: u32, due_date: DateTime<Utc>) -> Self {
        Self {
            target: Role::Debtor,
            title: "⏰ Payment reminder".to_string(),
            body: format!(
                "Installment {number} is due on {}. Don't forget to pay!",
                due_date.format("%d/%m/%Y")
            ),
            kind: NotificationType::Reminder,
        }
    }

    /// Message for a state transition of installment `number`.
    #[must_use]
    pub fn for_transition(kind: NotificationType, number: u32) -> Option<Self> {
        match kind {
            NotificationType::PaymentMarked => Some(Self::payment_marked(number)),
            NotificationType::PaymentConfirmed => Some(Self::payment_confirmed(number)),
            NotificationType::Reminder => None,
        }
    }
}

/// What happened on the push-relay channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// No relay configured
    Disabled,
    /// Relay accepted the request
    Sent {
        /// Devices the relay found for the recipient
        subscription_count: usize,
    },
    /// Relay unreachable or rejected the request
    Failed(String),
}

/// Result of one `notify` call.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// The stored row
    pub notification: Notification,
    /// Push-relay result
    pub push: PushOutcome,
}

/// Persists notifications and fans them out.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Storage>,
    relay: Option<Arc<dyn RelayApi>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("relay", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher over `store`, pushing through `relay` when given.
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, relay: Option<Arc<dyn RelayApi>>) -> Self {
        Self { store, relay }
    }

    /// Sends a composed message now.
    pub async fn send(&self, message: &NotificationMessage) -> Result<DeliveryReport> {
        self.notify(
            message.target.as_str(),
            &message.title,
            &message.body,
            message.kind,
        )
        .await
    }

    /// Persists and delivers a notification to `target_user_id`.
    pub async fn notify(
        &self,
        target_user_id: &str,
        title: &str,
        body: &str,
        kind: NotificationType,
    ) -> Result<DeliveryReport> {
        self.notify_at(target_user_id, title, body, kind, Utc::now())
            .await
    }

    /// [`Self::notify`] with an explicit creation time.
    pub async fn notify_at(
        &self,
        target_user_id: &str,
        title: &str,
        body: &str,
        kind: NotificationType,
        now: DateTime<Utc>,
    ) -> Result<DeliveryReport> {
        let notification = Notification::new(target_user_id, title, body, kind, now);

        // In-app (and realtime, for stores that publish inserts)
        self.store.insert_notification(&notification).await?;
        debug!(
            "Stored notification {} for {}",
            notification.id, notification.user_id
        );

        let push = self.push(&notification).await;
        Ok(DeliveryReport { notification, push })
    }

    async fn push(&self, notification: &Notification) -> PushOutcome {
        let Some(relay) = &self.relay else {
            return PushOutcome::Disabled;
        };

        let request = SendRequest {
            user_id: notification.user_id.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            // Already stored above; the relay must not insert a second row
            notification_id: Some(notification.id.clone()),
        };

        match relay.send(&request).await {
            Ok(reply) => {
                info!(
                    "Push relay accepted notification {} ({} subscriptions)",
                    notification.id, reply.subscription_count
                );
                PushOutcome::Sent {
                    subscription_count: reply.subscription_count,
                }
            }
            Err(e) => {
                warn!("Push relay failed for {}: {}", notification.id, e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use crate::storage::LocalStore;
    use crate::test_utils::{RecordingRelay, fixed_now};

    async fn local_store() -> Result<(tempfile::TempDir, Arc<dyn Storage>)> {
        let dir = tempfile::tempdir()?;
        let store = LocalStore::open(dir.path().join("store.json")).await?;
        Ok((dir, Arc::new(store)))
    }

    #[test]
    fn test_message_composition() {
        let marked = NotificationMessage::payment_marked(3);
        assert_eq!(marked.target, Role::Creditor);
        assert!(marked.body.contains("Installment 3"));

        let confirmed = NotificationMessage::payment_confirmed(3);
        assert_eq!(confirmed.target, Role::Debtor);
        assert_eq!(confirmed.kind, NotificationType::PaymentConfirmed);

        let reminder = NotificationMessage::reminder(5, fixed_now());
        assert_eq!(reminder.kind, NotificationType::Reminder);
        assert!(reminder.body.contains("15/05/2026"));

        assert!(NotificationMessage::for_transition(NotificationType::Reminder, 1).is_none());
    }

    #[tokio::test]
    async fn test_notify_without_relay_persists_only() -> Result<()> {
        let (_dir, store) = local_store().await?;
        let dispatcher = Dispatcher::new(Arc::clone(&store), None);

        let report = dispatcher
            .notify("creditor", "t", "b", NotificationType::PaymentMarked)
            .await?;
        assert_eq!(report.push, PushOutcome::Disabled);
        assert!(!report.notification.read);
        assert!(report.notification.id.starts_with("notif-"));
        assert_eq!(store.notifications_for("creditor").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_notify_forwards_to_relay_with_stored_id() -> Result<()> {
        let (_dir, store) = local_store().await?;
        let relay = Arc::new(RecordingRelay::with_subscriptions(2));
        let dispatcher = Dispatcher::new(Arc::clone(&store), Some(relay.clone()));

        let report = dispatcher
            .send(&NotificationMessage::payment_confirmed(7))
            .await?;
        assert_eq!(
            report.push,
            PushOutcome::Sent {
                subscription_count: 2
            }
        );

        let sent = relay.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, "debtor");
        assert_eq!(
            sent[0].notification_id.as_deref(),
            Some(report.notification.id.as_str())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_relay_failure_is_not_fatal() -> Result<()> {
        let (_dir, store) = local_store().await?;
        let relay = Arc::new(RecordingRelay::failing());
        let dispatcher = Dispatcher::new(Arc::clone(&store), Some(relay));

        let report = dispatcher
            .notify("debtor", "t", "b", NotificationType::Reminder)
            .await?;
        assert!(matches!(report.push, PushOutcome::Failed(_)));
        assert_eq!(store.notifications_for("debtor").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_notify_twice_creates_two_rows() -> Result<()> {
        let (_dir, store) = local_store().await?;
        let dispatcher = Dispatcher::new(Arc::clone(&store), None);
        for _ in 0..2 {
            dispatcher
                .notify("debtor", "t", "b", NotificationType::Reminder)
                .await?;
        }
        assert_eq!(store.notifications_for("debtor").await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_fails_notify() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A directory where the store file should be makes every write fail
        let path = dir.path().join("blocked");
        std::fs::create_dir_all(path.join("store.json.tmp"))?;
        let store: Arc<dyn Storage> = Arc::new(LocalStore::open(path.join("store.json")).await?);
        let dispatcher = Dispatcher::new(store, None);

        let result = dispatcher
            .notify("debtor", "t", "b", NotificationType::Reminder)
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
        Ok(())
    }
}
