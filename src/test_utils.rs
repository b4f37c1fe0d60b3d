//! Shared test utilities for `Promissoria`.
//!
//! This module provides helpers for setting up test stores, sample data with
//! sensible defaults, and recording doubles for the relay, the push services,
//! the device platform and the local notifier.

use crate::{
    config::{CredentialConfig, IdentityTable, settings::ContractConfig},
    core::contract::build_default_contract,
    errors::{Error, Result},
    models::{Contract, Notification, PushSubscription, SubscriptionData, SubscriptionKeys},
    observer::LocalNotifier,
    push::{
        sender::{PushFailure, PushSender},
        subscription::{Permission, PushPlatform},
    },
    relay::{RelayApi, SendReply, SendRequest},
    storage::RemoteStore,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// The instant most tests treat as "now": 2026-05-15 12:00 UTC.
///
/// Installments #1-#4 are overdue at this point, #5 was due five days earlier.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Identity table with two named parties.
///
/// # Defaults
/// * debtor: "Pedro Henrique" / "pedro123", Discord id "1001"
/// * creditor: "Lindomar Barbosa" / "lindomar123", Discord id "2002"
pub fn sample_identities() -> IdentityTable {
    IdentityTable::new(
        CredentialConfig {
            name: "Pedro Henrique".to_string(),
            password: "pedro123".to_string(),
            login_alias: None,
            document: Some("000.000.000-00".to_string()),
            phone: None,
            discord_id: Some("1001".to_string()),
        },
        CredentialConfig {
            name: "Lindomar Barbosa".to_string(),
            password: "lindomar123".to_string(),
            login_alias: None,
            document: None,
            phone: None,
            discord_id: Some("2002".to_string()),
        },
    )
}

/// The default contract: 20 pending installments of 1000, due on the 10th of
/// each month from 2026-01-10, created at [`fixed_now`].
pub fn sample_contract() -> Contract {
    build_default_contract(&ContractConfig::default(), &sample_identities(), fixed_now())
}

/// A push subscription with placeholder key material.
pub fn sample_subscription(user_id: &str, endpoint: &str) -> PushSubscription {
    PushSubscription {
        user_id: user_id.to_string(),
        endpoint: endpoint.to_string(),
        p256dh: "p256dh-key".to_string(),
        auth: "auth-secret".to_string(),
    }
}

/// Creates an in-memory `SQLite` relational store with all tables initialized.
pub async fn setup_remote_store() -> Result<RemoteStore> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(RemoteStore::new(db))
}

/// [`RelayApi`] double that records every call.
#[derive(Debug, Default)]
pub struct RecordingRelay {
    fail: bool,
    subscription_count: usize,
    /// `send` requests, in order
    pub sent: Mutex<Vec<SendRequest>>,
    /// `subscribe` calls as (user id, data)
    pub subscribed: Mutex<Vec<(String, SubscriptionData)>>,
    /// `unsubscribe` calls as (user id, endpoint)
    pub unsubscribed: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingRelay {
    /// Relay that accepts everything and reports `subscription_count` devices.
    pub fn with_subscriptions(subscription_count: usize) -> Self {
        Self {
            subscription_count,
            ..Self::default()
        }
    }

    /// Relay that is unreachable.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(Error::Relay {
                status: 503,
                message: "relay unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RelayApi for RecordingRelay {
    async fn subscribe(&self, user_id: &str, subscription: &SubscriptionData) -> Result<()> {
        self.check()?;
        self.subscribed
            .lock()
            .await
            .push((user_id.to_string(), subscription.clone()));
        Ok(())
    }

    async fn send(&self, request: &SendRequest) -> Result<SendReply> {
        self.check()?;
        self.sent.lock().await.push(request.clone());
        Ok(SendReply {
            success: true,
            subscription_count: self.subscription_count,
            delivered: self.subscription_count,
        })
    }

    async fn unsubscribe(&self, user_id: &str, endpoint: Option<&str>) -> Result<()> {
        self.check()?;
        self.unsubscribed
            .lock()
            .await
            .push((user_id.to_string(), endpoint.map(str::to_string)));
        Ok(())
    }
}

/// [`PushSender`] double. Delivers everything unless an endpoint was told to fail.
#[derive(Debug, Default)]
pub struct RecordingPushSender {
    failures: Mutex<HashMap<String, PushFailure>>,
    /// Successful deliveries as (endpoint, payload)
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPushSender {
    /// Makes every push to `endpoint` fail with `failure`.
    pub async fn fail_endpoint(&self, endpoint: &str, failure: PushFailure) {
        self.failures
            .lock()
            .await
            .insert(endpoint.to_string(), failure);
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<(), PushFailure> {
        if let Some(failure) = self.failures.lock().await.get(&subscription.endpoint) {
            return Err(failure.clone());
        }
        self.sent
            .lock()
            .await
            .push((subscription.endpoint.clone(), payload.to_vec()));
        Ok(())
    }
}

/// In-memory device platform.
///
/// # Defaults (see the constructors)
/// * push supported, running installed
/// * worker not yet registered
/// * no local subscription
#[derive(Debug)]
pub struct InMemoryPlatform {
    supported: bool,
    standalone: bool,
    permission: Mutex<Permission>,
    prompt_answer: Permission,
    worker_active: AtomicBool,
    subscription: Mutex<Option<SubscriptionData>>,
    /// Worker installs performed
    pub worker_registrations: AtomicUsize,
    /// Permission prompts shown
    pub prompts: AtomicUsize,
    /// Subscriptions created
    pub created: AtomicUsize,
}

impl InMemoryPlatform {
    /// Endpoint of subscriptions this platform creates.
    pub const ENDPOINT: &'static str = "https://push.example/device-1";

    fn with(supported: bool, permission: Permission, prompt_answer: Permission) -> Self {
        Self {
            supported,
            standalone: true,
            permission: Mutex::new(permission),
            prompt_answer,
            worker_active: AtomicBool::new(false),
            subscription: Mutex::new(None),
            worker_registrations: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    /// Never asked; the user grants when prompted.
    pub fn granting() -> Self {
        Self::with(true, Permission::Default, Permission::Granted)
    }

    /// Permission already denied.
    pub fn denied() -> Self {
        Self::with(true, Permission::Denied, Permission::Denied)
    }

    /// No push support at all.
    pub fn unsupported() -> Self {
        Self::with(false, Permission::Default, Permission::Denied)
    }

    /// Same platform, but running in a browser tab.
    #[must_use]
    pub fn in_tab(mut self) -> Self {
        self.standalone = false;
        self
    }
}

#[async_trait]
impl PushPlatform for InMemoryPlatform {
    fn supports_push(&self) -> bool {
        self.supported
    }

    fn is_standalone(&self) -> bool {
        self.standalone
    }

    async fn worker_active(&self) -> bool {
        self.worker_active.load(Ordering::SeqCst)
    }

    async fn register_worker(&self) -> Result<()> {
        if !self.supported {
            return Err(Error::WorkerUnavailable);
        }
        self.worker_registrations.fetch_add(1, Ordering::SeqCst);
        self.worker_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn permission(&self) -> Permission {
        *self.permission.lock().await
    }

    async fn request_permission(&self) -> Result<Permission> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().await = self.prompt_answer;
        Ok(self.prompt_answer)
    }

    async fn existing_subscription(&self) -> Result<Option<SubscriptionData>> {
        Ok(self.subscription.lock().await.clone())
    }

    async fn create_subscription(&self, application_server_key: &[u8]) -> Result<SubscriptionData> {
        if application_server_key.len() != 65 {
            return Err(Error::InvalidVapidKey);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let data = SubscriptionData {
            endpoint: Self::ENDPOINT.to_string(),
            keys: SubscriptionKeys {
                p256dh: "device-p256dh".to_string(),
                auth: "device-auth".to_string(),
            },
        };
        *self.subscription.lock().await = Some(data.clone());
        Ok(data)
    }

    async fn remove_subscription(&self) -> Result<()> {
        *self.subscription.lock().await = None;
        Ok(())
    }
}

/// [`LocalNotifier`] double that records what it shows.
#[derive(Debug)]
pub struct RecordingNotifier {
    permission: bool,
    foreground: bool,
    /// Notifications shown, in order
    pub shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Notifier with fixed permission and foreground state.
    pub fn new(permission: bool, foreground: bool) -> Self {
        Self {
            permission,
            foreground,
            shown: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LocalNotifier for RecordingNotifier {
    fn permission_granted(&self) -> bool {
        self.permission
    }

    fn is_foreground(&self) -> bool {
        self.foreground
    }

    async fn show(&self, notification: &Notification) -> Result<()> {
        self.shown.lock().await.push(notification.clone());
        Ok(())
    }
}
