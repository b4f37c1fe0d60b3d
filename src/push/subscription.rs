//! Device-side push subscription management.
//!
//! A device moves `Unregistered → PermissionRequested → Subscribed`. Every
//! step may fail; the failure only disables push for that device, the in-app
//! and realtime channels keep working.

use crate::{
    errors::{Error, Result},
    models::SubscriptionData,
    relay::RelayApi,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Notification permission as the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Never asked
    Default,
    /// Granted
    Granted,
    /// Denied; the platform will not ask again
    Denied,
}

/// Where a device is in the subscription flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No subscription known
    Unregistered,
    /// Permission was asked for (and granted or not)
    PermissionRequested,
    /// Subscription stored at the relay
    Subscribed,
}

/// Platform services the manager needs: background worker, permission
/// prompt and push manager.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether this platform can do push at all.
    fn supports_push(&self) -> bool;

    /// Whether the app runs installed (standalone) rather than in a browser tab.
    fn is_standalone(&self) -> bool;

    /// Whether the background worker is installed and active.
    async fn worker_active(&self) -> bool;

    /// Installs the background worker and waits until it is active.
    async fn register_worker(&self) -> Result<()>;

    /// Current permission, without prompting.
    async fn permission(&self) -> Permission;

    /// Prompts the user.
    async fn request_permission(&self) -> Result<Permission>;

    /// Subscription the push manager already holds.
    async fn existing_subscription(&self) -> Result<Option<SubscriptionData>>;

    /// Creates a subscription bound to `application_server_key`.
    async fn create_subscription(&self, application_server_key: &[u8]) -> Result<SubscriptionData>;

    /// Drops the local subscription.
    async fn remove_subscription(&self) -> Result<()>;
}

/// Decodes the relay operator's public key (URL-safe base64, padding optional)
/// into the uncompressed P-256 point the push manager expects.
pub fn decode_vapid_key(key: &str) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key.trim().trim_end_matches('='))
        .map_err(|e| {
            warn!("VAPID public key is not URL-safe base64: {}", e);
            Error::InvalidVapidKey
        })?;
    if bytes.len() != 65 || bytes[0] != 0x04 {
        warn!("VAPID public key has {} bytes, expected an uncompressed point", bytes.len());
        return Err(Error::InvalidVapidKey);
    }
    Ok(bytes)
}

/// Drives one device through the subscription flow.
pub struct SubscriptionManager {
    platform: Arc<dyn PushPlatform>,
    relay: Arc<dyn RelayApi>,
    vapid_public_key: String,
    require_standalone: bool,
    state: Mutex<DeviceState>,
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("require_standalone", &self.require_standalone)
            .finish_non_exhaustive()
    }
}

impl SubscriptionManager {
    /// Manager for one device.
    #[must_use]
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        relay: Arc<dyn RelayApi>,
        vapid_public_key: impl Into<String>,
        require_standalone: bool,
    ) -> Self {
        Self {
            platform,
            relay,
            vapid_public_key: vapid_public_key.into(),
            require_standalone,
            state: Mutex::new(DeviceState::Unregistered),
        }
    }

    /// Current device state.
    pub async fn state(&self) -> DeviceState {
        *self.state.lock().await
    }

    /// Ensures the background worker is installed and active. No-op when it already is.
    pub async fn register(&self) -> Result<()> {
        if !self.platform.supports_push() {
            return Err(Error::PushUnsupported);
        }
        if self.platform.worker_active().await {
            return Ok(());
        }
        self.platform.register_worker().await.inspect_err(|e| {
            warn!("Background worker registration failed: {}", e);
        })?;
        info!("Background worker active");
        Ok(())
    }

    /// Asks for notification permission. A previous denial is not re-asked.
    pub async fn request_permission(&self) -> Result<bool> {
        if !self.platform.supports_push() {
            return Err(Error::PushUnsupported);
        }

        let permission = match self.platform.permission().await {
            Permission::Default => self.platform.request_permission().await?,
            known => known,
        };
        *self.state.lock().await = DeviceState::PermissionRequested;

        if permission == Permission::Denied {
            info!("Notification permission denied; push stays off for this device");
        }
        Ok(permission == Permission::Granted)
    }

    /// Subscribes this device for `user_id` and stores it at the relay.
    ///
    /// Returns `Ok(false)` without doing anything when installed mode is
    /// required and the app runs in a tab.
    pub async fn subscribe(&self, user_id: &str) -> Result<bool> {
        if self.require_standalone && !self.platform.is_standalone() {
            info!("Not running installed; skipping push subscription");
            return Ok(false);
        }

        if !self.request_permission().await? {
            return Err(Error::PermissionDenied);
        }
        self.register().await.map_err(|e| match e {
            Error::PushUnsupported => e,
            _ => Error::WorkerUnavailable,
        })?;

        let subscription = if let Some(existing) = self.platform.existing_subscription().await? {
            info!("Reusing existing push subscription");
            existing
        } else {
            let key = decode_vapid_key(&self.vapid_public_key)?;
            let created = self.platform.create_subscription(&key).await?;
            info!("Created push subscription");
            created
        };

        if subscription.endpoint.is_empty()
            || subscription.keys.p256dh.is_empty()
            || subscription.keys.auth.is_empty()
        {
            return Err(Error::Push {
                message: "Subscription is missing its endpoint or keys".to_string(),
            });
        }

        self.relay.subscribe(user_id, &subscription).await?;
        *self.state.lock().await = DeviceState::Subscribed;
        info!("Push subscription stored for {}", user_id);
        Ok(true)
    }

    /// Drops the local subscription, then asks the relay to forget it. Both
    /// steps are best effort; a failed remote delete does not restore the
    /// local subscription.
    pub async fn unsubscribe(&self, user_id: &str) -> Result<bool> {
        if !self.platform.supports_push() {
            return Ok(false);
        }

        let endpoint = match self.platform.existing_subscription().await {
            Ok(subscription) => subscription.map(|s| s.endpoint),
            Err(e) => {
                warn!("Could not read local push subscription: {}", e);
                None
            }
        };
        if endpoint.is_some() {
            if let Err(e) = self.platform.remove_subscription().await {
                warn!("Local unsubscribe failed: {}", e);
            }
        }

        if let Err(e) = self.relay.unsubscribe(user_id, endpoint.as_deref()).await {
            warn!("Relay unsubscribe failed for {}: {}", user_id, e);
        }

        *self.state.lock().await = DeviceState::Unregistered;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{InMemoryPlatform, RecordingRelay};
    use std::sync::atomic::Ordering;

    const KEY: &str =
        "BLBz5Gh3qHVIUlG4HKV3MYy-tPxZHvXZkL3mS6z7n3f1XhQZGvQbJhELPbkKdHqNMPLJ3lPrO9oRtYz8xS6MqJU";

    fn manager(
        platform: &Arc<InMemoryPlatform>,
        relay: &Arc<RecordingRelay>,
        require_standalone: bool,
    ) -> SubscriptionManager {
        SubscriptionManager::new(
            Arc::clone(platform) as Arc<dyn PushPlatform>,
            Arc::clone(relay) as Arc<dyn RelayApi>,
            KEY,
            require_standalone,
        )
    }

    #[test]
    fn test_decode_vapid_key() {
        assert_eq!(decode_vapid_key(KEY).unwrap().len(), 65);
        assert_eq!(decode_vapid_key(&format!("{KEY}=")).unwrap()[0], 0x04);
        assert!(matches!(decode_vapid_key("not base64!"), Err(Error::InvalidVapidKey)));
        assert!(matches!(decode_vapid_key("AAAA"), Err(Error::InvalidVapidKey)));
    }

    #[tokio::test]
    async fn test_subscribe_twice_reuses_subscription() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::granting());
        let relay = Arc::new(RecordingRelay::with_subscriptions(1));
        let manager = manager(&platform, &relay, true);

        assert!(manager.subscribe("debtor").await?);
        assert!(manager.subscribe("debtor").await?);

        assert_eq!(manager.state().await, DeviceState::Subscribed);
        assert_eq!(platform.created.load(Ordering::SeqCst), 1);
        assert_eq!(platform.worker_registrations.load(Ordering::SeqCst), 1);
        let subscribed = relay.subscribed.lock().await;
        assert_eq!(subscribed.len(), 2);
        assert_eq!(subscribed[0], subscribed[1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_tab_mode_skips_when_standalone_required() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::granting().in_tab());
        let relay = Arc::new(RecordingRelay::with_subscriptions(0));

        assert!(!manager(&platform, &relay, true).subscribe("debtor").await?);
        assert!(relay.subscribed.lock().await.is_empty());

        assert!(manager(&platform, &relay, false).subscribe("debtor").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_denied_permission_is_not_reasked() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::denied());
        let relay = Arc::new(RecordingRelay::with_subscriptions(0));
        let manager = manager(&platform, &relay, false);

        assert!(matches!(
            manager.subscribe("creditor").await,
            Err(Error::PermissionDenied)
        ));
        assert!(!manager.request_permission().await?);
        assert_eq!(platform.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state().await, DeviceState::PermissionRequested);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_platform() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::unsupported());
        let relay = Arc::new(RecordingRelay::with_subscriptions(0));
        let manager = manager(&platform, &relay, false);

        assert!(matches!(manager.register().await, Err(Error::PushUnsupported)));
        assert!(!manager.unsubscribe("debtor").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsubscribe_survives_relay_failure() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::granting());
        let manager = manager(&platform, &Arc::new(RecordingRelay::with_subscriptions(1)), false);
        manager.subscribe("debtor").await?;

        let failing = Arc::new(RecordingRelay::failing());
        let manager = SubscriptionManager::new(
            Arc::clone(&platform) as Arc<dyn PushPlatform>,
            failing as Arc<dyn RelayApi>,
            KEY,
            false,
        );
        assert!(manager.unsubscribe("debtor").await?);
        assert!(platform.existing_subscription().await?.is_none());
        assert_eq!(manager.state().await, DeviceState::Unregistered);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsubscribe_sends_local_endpoint() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::granting());
        let relay = Arc::new(RecordingRelay::with_subscriptions(1));
        let manager = manager(&platform, &relay, false);
        manager.subscribe("debtor").await?;
        manager.unsubscribe("debtor").await?;

        let unsubscribed = relay.unsubscribed.lock().await;
        assert_eq!(
            unsubscribed.as_slice(),
            [(
                "debtor".to_string(),
                Some(InMemoryPlatform::ENDPOINT.to_string())
            )]
        );
        Ok(())
    }
}
