//! Relational store with realtime change events.
//!
//! Contract fields are spread across tables: party names, documents and the
//! creditor's PIX key live on `users`, installments on `promissories`. The
//! aggregate is reassembled on every load. Writes publish a [`StoreEvent`] on a
//! broadcast channel after they commit, which is how connected clients observe
//! them without polling.

use super::{Storage, StoreEvent};
use crate::{
    entities::{
        Notification as NotificationEntity, NotificationColumn, Promissory, PromissoryColumn,
        PushSubscription as PushSubscriptionEntity, PushSubscriptionColumn, User as UserEntity,
        notification, promissory, push_subscription, user,
    },
    errors::{Error, Result},
    models::{
        Contract, Installment, InstallmentStatus, Notification, NotificationType,
        PushSubscription, Role, User,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::NotSet, Condition, ConnectionTrait, DatabaseConnection, QueryOrder, Set,
    TransactionTrait, prelude::*,
};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// `SeaORM` adapter.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    db: DatabaseConnection,
    events: broadcast::Sender<StoreEvent>,
}

impl RemoteStore {
    /// Wraps an already migrated connection.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { db, events }
    }

    fn publish(&self, event: StoreEvent) {
        // No receivers just means no client is connected right now
        let _ = self.events.send(event);
    }
}

fn installment_from_row(row: promissory::Model) -> Result<Installment> {
    let status = InstallmentStatus::parse(&row.status).ok_or_else(|| Error::Config {
        message: format!("Unknown installment status '{}' on {}", row.status, row.id),
    })?;
    Ok(Installment {
        id: row.id,
        number: u32::try_from(row.number).unwrap_or_default(),
        amount: row.amount,
        due_date: row.due_date,
        status,
        debtor_confirmed_at: row.debtor_confirmed_at,
        creditor_confirmed_at: row.creditor_confirmed_at,
        receipt: row.receipt_url,
        paid_at: row.paid_at,
    })
}

fn installment_to_active(
    installment: &Installment,
    created_at: DateTimeUtc,
) -> promissory::ActiveModel {
    promissory::ActiveModel {
        id: Set(installment.id.clone()),
        number: Set(i32::try_from(installment.number).unwrap_or(i32::MAX)),
        amount: Set(installment.amount),
        due_date: Set(installment.due_date),
        status: Set(installment.status.as_str().to_string()),
        debtor_confirmed_at: Set(installment.debtor_confirmed_at),
        creditor_confirmed_at: Set(installment.creditor_confirmed_at),
        receipt_url: Set(installment.receipt.clone()),
        paid_at: Set(installment.paid_at),
        created_at: Set(created_at),
    }
}

fn notification_from_row(row: notification::Model) -> Result<Notification> {
    let kind = NotificationType::parse(&row.kind).ok_or_else(|| Error::Config {
        message: format!("Unknown notification type '{}' on {}", row.kind, row.id),
    })?;
    Ok(Notification {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        message: row.message,
        kind,
        read: row.read,
        created_at: row.created_at,
    })
}

fn subscription_from_row(row: push_subscription::Model) -> PushSubscription {
    PushSubscription {
        user_id: row.user_id,
        endpoint: row.endpoint,
        p256dh: row.p256dh,
        auth: row.auth,
    }
}

/// Inserts or updates a user row, leaving unspecified columns untouched.
async fn upsert_user<C: ConnectionTrait>(db: &C, row: user::ActiveModel, id: &str) -> Result<()> {
    if UserEntity::find_by_id(id.to_string()).one(db).await?.is_some() {
        row.update(db).await?;
    } else {
        row.insert(db).await?;
    }
    Ok(())
}

#[async_trait]
impl Storage for RemoteStore {
    async fn load_contract(&self) -> Result<Option<Contract>> {
        let rows = Promissory::find()
            .order_by_asc(PromissoryColumn::Number)
            .all(&self.db)
            .await?;
        let Some(created_at) = rows.first().map(|r| r.created_at) else {
            return Ok(None);
        };

        let debtor = UserEntity::find_by_id(Role::Debtor.as_str().to_string())
            .one(&self.db)
            .await?;
        let creditor = UserEntity::find_by_id(Role::Creditor.as_str().to_string())
            .one(&self.db)
            .await?;

        let installments = rows
            .into_iter()
            .map(installment_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Contract {
            id: Contract::ID.to_string(),
            debtor_name: debtor.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
            debtor_document: debtor.as_ref().and_then(|u| u.document.clone()),
            debtor_phone: debtor.as_ref().and_then(|u| u.phone.clone()),
            creditor_name: creditor.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
            creditor_document: creditor.as_ref().and_then(|u| u.document.clone()),
            creditor_pix_key: creditor.and_then(|u| u.pix_key),
            total_amount: installments.iter().map(|p| p.amount).sum(),
            installments,
            created_at,
        }))
    }

    async fn save_contract(&self, contract: &Contract) -> Result<()> {
        let txn = self.db.begin().await?;

        let parties = [
            (
                Role::Debtor,
                &contract.debtor_name,
                &contract.debtor_document,
                &contract.debtor_phone,
                NotSet,
            ),
            (
                Role::Creditor,
                &contract.creditor_name,
                &contract.creditor_document,
                &None,
                Set(contract.creditor_pix_key.clone()),
            ),
        ];
        for (role, name, document, phone, pix_key) in parties {
            let row = user::ActiveModel {
                id: Set(role.as_str().to_string()),
                name: Set(name.clone()),
                role: Set(role.as_str().to_string()),
                document: Set(document.clone()),
                phone: Set(phone.clone()),
                pix_key,
            };
            upsert_user(&txn, row, role.as_str()).await?;
        }

        Promissory::delete_many().exec(&txn).await?;
        for installment in &contract.installments {
            installment_to_active(installment, contract.created_at)
                .insert(&txn)
                .await?;
        }

        txn.commit().await?;
        self.publish(StoreEvent::ContractUpdated);
        Ok(())
    }

    async fn save_installment(&self, installment: &Installment) -> Result<()> {
        let existing = Promissory::find_by_id(installment.id.clone())
            .one(&self.db)
            .await?
            .ok_or(Error::ContractMissing)?;

        // Single-row update is atomic on its own
        installment_to_active(installment, existing.created_at)
            .update(&self.db)
            .await?;

        self.publish(StoreEvent::InstallmentUpdated(installment.clone()));
        Ok(())
    }

    async fn set_creditor_pix_key(&self, pix_key: Option<&str>) -> Result<()> {
        let creditor = UserEntity::find_by_id(Role::Creditor.as_str().to_string())
            .one(&self.db)
            .await?
            .ok_or(Error::ContractMissing)?;
        let mut row: user::ActiveModel = creditor.into();
        row.pix_key = Set(pix_key.map(str::to_string));
        row.update(&self.db).await?;

        self.publish(StoreEvent::ContractUpdated);
        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>> {
        let Some(row) = UserEntity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let role = Role::parse(&row.role).ok_or_else(|| Error::Config {
            message: format!("Unknown role '{}' for user {}", row.role, row.id),
        })?;
        Ok(Some(User {
            id: row.id,
            name: row.name,
            role,
            pix_key: row.pix_key,
        }))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let row = user::ActiveModel {
            id: Set(user.id.clone()),
            name: Set(user.name.clone()),
            role: Set(user.role.as_str().to_string()),
            document: NotSet,
            phone: NotSet,
            pix_key: Set(user.pix_key.clone()),
        };
        upsert_user(&self.db, row, &user.id).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        notification::ActiveModel {
            id: Set(notification.id.clone()),
            user_id: Set(notification.user_id.clone()),
            title: Set(notification.title.clone()),
            message: Set(notification.message.clone()),
            kind: Set(notification.kind.as_str().to_string()),
            read: Set(notification.read),
            created_at: Set(notification.created_at),
        }
        .insert(&self.db)
        .await?;

        self.publish(StoreEvent::NotificationCreated(notification.clone()));
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .order_by_desc(NotificationColumn::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(notification_from_row)
            .collect()
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<bool> {
        let Some(row) = NotificationEntity::find_by_id(notification_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(false);
        };
        let user_id = row.user_id.clone();
        let mut active: notification::ActiveModel = row.into();
        active.read = Set(true);
        active.update(&self.db).await?;

        self.publish(StoreEvent::NotificationsChanged { user_id });
        Ok(true)
    }

    async fn clear_notifications(&self, user_id: &str) -> Result<u64> {
        let result = NotificationEntity::delete_many()
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        self.publish(StoreEvent::NotificationsChanged {
            user_id: user_id.to_string(),
        });
        Ok(result.rows_affected)
    }

    async fn upsert_push_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        let txn = self.db.begin().await?;
        let existing = PushSubscriptionEntity::find()
            .filter(
                Condition::all()
                    .add(PushSubscriptionColumn::UserId.eq(subscription.user_id.as_str()))
                    .add(PushSubscriptionColumn::Endpoint.eq(subscription.endpoint.as_str())),
            )
            .one(&txn)
            .await?;

        let row = push_subscription::ActiveModel {
            id: existing.map_or(NotSet, |row| Set(row.id)),
            user_id: Set(subscription.user_id.clone()),
            endpoint: Set(subscription.endpoint.clone()),
            p256dh: Set(subscription.p256dh.clone()),
            auth: Set(subscription.auth.clone()),
            updated_at: Set(Utc::now()),
        };
        row.save(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn push_subscriptions_for(&self, user_id: &str) -> Result<Vec<PushSubscription>> {
        Ok(PushSubscriptionEntity::find()
            .filter(PushSubscriptionColumn::UserId.eq(user_id))
            .order_by_asc(PushSubscriptionColumn::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(subscription_from_row)
            .collect())
    }

    async fn delete_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<u64> {
        let result = PushSubscriptionEntity::delete_many()
            .filter(PushSubscriptionColumn::UserId.eq(user_id))
            .filter(PushSubscriptionColumn::Endpoint.eq(endpoint))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    fn changes(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{fixed_now, sample_contract, sample_subscription, setup_remote_store};

    #[tokio::test]
    async fn test_contract_is_reassembled_from_tables() -> Result<()> {
        let store = setup_remote_store().await?;
        assert!(store.load_contract().await?.is_none());

        let mut contract = sample_contract();
        contract.creditor_pix_key = Some("pix-key".to_string());
        store.save_contract(&contract).await?;

        let loaded = store.load_contract().await?.unwrap();
        assert_eq!(loaded.installments, contract.installments);
        assert_eq!(loaded.debtor_name, contract.debtor_name);
        assert_eq!(loaded.creditor_pix_key.as_deref(), Some("pix-key"));
        assert!((loaded.total_amount - 20_000.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_installment_publishes_event() -> Result<()> {
        let store = setup_remote_store().await?;
        store.save_contract(&sample_contract()).await?;
        let mut events = store.changes().unwrap();

        let mut installment = sample_contract().installments[0].clone();
        installment.status = InstallmentStatus::PaidByDebtor;
        store.save_installment(&installment).await?;

        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::InstallmentUpdated(installment.clone())
        );
        let loaded = store.load_contract().await?.unwrap();
        assert_eq!(loaded.installments[0].status, InstallmentStatus::PaidByDebtor);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_unknown_installment_fails() -> Result<()> {
        let store = setup_remote_store().await?;
        let installment = sample_contract().installments[0].clone();
        assert!(matches!(
            store.save_installment(&installment).await,
            Err(Error::ContractMissing)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_notification_insert_is_observed_in_realtime() -> Result<()> {
        let store = setup_remote_store().await?;
        let mut events = store.changes().unwrap();
        let notification = Notification::new(
            "debtor",
            "title",
            "body",
            NotificationType::Reminder,
            fixed_now(),
        );
        store.insert_notification(&notification).await?;

        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::NotificationCreated(notification.clone())
        );
        assert_eq!(store.notifications_for("debtor").await?, vec![notification.clone()]);

        assert!(store.mark_notification_read(&notification.id).await?);
        assert!(store.notifications_for("debtor").await?[0].read);
        assert_eq!(store.clear_notifications("debtor").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_one_row() -> Result<()> {
        let store = setup_remote_store().await?;
        let subscription = sample_subscription("creditor", "https://push.example/a");
        store.upsert_push_subscription(&subscription).await?;
        store.upsert_push_subscription(&subscription).await?;
        store
            .upsert_push_subscription(&sample_subscription("creditor", "https://push.example/b"))
            .await?;

        let stored = store.push_subscriptions_for("creditor").await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], subscription);

        assert_eq!(
            store
                .delete_push_subscription("creditor", "https://push.example/a")
                .await?,
            1
        );
        assert_eq!(store.push_subscriptions_for("creditor").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_pix_key_and_users() -> Result<()> {
        let store = setup_remote_store().await?;
        store.save_contract(&sample_contract()).await?;
        store.set_creditor_pix_key(Some("key-1")).await?;

        let creditor = store.load_user("creditor").await?.unwrap();
        assert_eq!(creditor.role, Role::Creditor);
        assert_eq!(creditor.pix_key.as_deref(), Some("key-1"));
        assert_eq!(
            store.load_contract().await?.unwrap().creditor_pix_key.as_deref(),
            Some("key-1")
        );
        Ok(())
    }
}
