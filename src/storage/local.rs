//! Local key-value store backed by a single JSON file.
//!
//! Records mirror the browser storage layout: one key for the users, one for
//! the contract aggregate, one for the notification list and one for push
//! subscriptions. Every write rewrites the whole file through a temp file and
//! rename, so a crash never leaves a half-written document behind.

use super::Storage;
use crate::{
    errors::{Error, Result},
    models::{Contract, Installment, Notification, PushSubscription, User},
};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const USERS_KEY: &str = "promissoria_user";
const CONTRACT_KEY: &str = "promissoria_contract";
const NOTIFICATIONS_KEY: &str = "promissoria_notifications";
const SUBSCRIPTIONS_KEY: &str = "promissoria_push_subscriptions";

/// JSON-file key-value adapter.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    records: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Opens the store, reading the file if it already exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Opened local store {:?} with {} records", path, records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let records = self.records.lock().await;
        records
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Read-modify-write of one record under the store lock.
    ///
    /// The in-memory map only changes once the file write succeeded, so a
    /// failed write leaves both copies at the previous value.
    async fn update<T, R, F>(&self, key: &str, apply: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R> + Send,
    {
        let mut records = self.records.lock().await;
        let mut value: T = records
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let result = apply(&mut value)?;

        let mut staged = records.clone();
        staged.insert(key.to_string(), serde_json::to_value(&value)?);
        self.persist(&staged).await?;
        *records = staged;
        Ok(result)
    }

    async fn persist(&self, records: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update_contract<R, F>(&self, apply: F) -> Result<R>
    where
        F: FnOnce(&mut Contract) -> R + Send,
    {
        self.update(CONTRACT_KEY, |slot: &mut Option<Contract>| {
            slot.as_mut().map(apply).ok_or(Error::ContractMissing)
        })
        .await
    }
}

#[async_trait]
impl Storage for LocalStore {
    async fn load_contract(&self) -> Result<Option<Contract>> {
        self.get(CONTRACT_KEY).await
    }

    async fn save_contract(&self, contract: &Contract) -> Result<()> {
        let contract = contract.clone();
        self.update(CONTRACT_KEY, move |slot: &mut Option<Contract>| {
            *slot = Some(contract);
            Ok(())
        })
        .await
    }

    async fn save_installment(&self, installment: &Installment) -> Result<()> {
        let installment = installment.clone();
        let replaced = self
            .update_contract(move |contract| {
                let id = installment.id.clone();
                contract
                    .installment_mut(&id)
                    .map(|slot| *slot = installment)
                    .is_some()
            })
            .await?;
        if !replaced {
            tracing::warn!("Installment write ignored: id not in contract");
        }
        Ok(())
    }

    async fn set_creditor_pix_key(&self, pix_key: Option<&str>) -> Result<()> {
        let pix_key = pix_key.map(str::to_string);
        self.update_contract(move |contract| contract.creditor_pix_key = pix_key)
            .await
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>> {
        let users: Option<BTreeMap<String, User>> = self.get(USERS_KEY).await?;
        Ok(users.and_then(|mut users| users.remove(user_id)))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.update(USERS_KEY, move |users: &mut BTreeMap<String, User>| {
            users.insert(user.id.clone(), user);
            Ok(())
        })
        .await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let notification = notification.clone();
        self.update(NOTIFICATIONS_KEY, move |list: &mut Vec<Notification>| {
            list.insert(0, notification);
            Ok(())
        })
        .await
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let list: Vec<Notification> = self.get(NOTIFICATIONS_KEY).await?.unwrap_or_default();
        let mut mine: Vec<Notification> =
            list.into_iter().filter(|n| n.user_id == user_id).collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<bool> {
        let id = notification_id.to_string();
        self.update(NOTIFICATIONS_KEY, move |list: &mut Vec<Notification>| {
            Ok(list
                .iter_mut()
                .find(|n| n.id == id)
                .map(|n| n.read = true)
                .is_some())
        })
        .await
    }

    async fn clear_notifications(&self, user_id: &str) -> Result<u64> {
        let user_id = user_id.to_string();
        self.update(NOTIFICATIONS_KEY, move |list: &mut Vec<Notification>| {
            let before = list.len();
            list.retain(|n| n.user_id != user_id);
            Ok((before - list.len()) as u64)
        })
        .await
    }

    async fn upsert_push_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        let subscription = subscription.clone();
        self.update(SUBSCRIPTIONS_KEY, move |list: &mut Vec<PushSubscription>| {
            match list.iter_mut().find(|s| {
                s.user_id == subscription.user_id && s.endpoint == subscription.endpoint
            }) {
                Some(existing) => *existing = subscription,
                None => list.push(subscription),
            }
            Ok(())
        })
        .await
    }

    async fn push_subscriptions_for(&self, user_id: &str) -> Result<Vec<PushSubscription>> {
        let list: Vec<PushSubscription> = self.get(SUBSCRIPTIONS_KEY).await?.unwrap_or_default();
        Ok(list.into_iter().filter(|s| s.user_id == user_id).collect())
    }

    async fn delete_push_subscription(&self, user_id: &str, endpoint: &str) -> Result<u64> {
        let (user_id, endpoint) = (user_id.to_string(), endpoint.to_string());
        self.update(SUBSCRIPTIONS_KEY, move |list: &mut Vec<PushSubscription>| {
            let before = list.len();
            list.retain(|s| !(s.user_id == user_id && s.endpoint == endpoint));
            Ok((before - list.len()) as u64)
        })
        .await
    }
}
