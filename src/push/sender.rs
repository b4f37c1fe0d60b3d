//! Encrypted push delivery used by the relay.
//!
//! Payloads are encrypted per subscription (aes128gcm) and signed with the
//! operator's VAPID key through the `web-push` crate.

use crate::{
    errors::{Error, Result},
    models::PushSubscription,
};
use async_trait::async_trait;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

/// Seconds a push service keeps an undelivered message.
const PUSH_TTL_SECS: u32 = 24 * 60 * 60;

/// Why a single push failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFailure {
    /// The push service says this endpoint no longer exists; drop it
    Gone,
    /// Anything else; the subscription stays
    Other(String),
}

/// Delivers one payload to one subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Encrypts and sends `payload` to `subscription`.
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<(), PushFailure>;
}

/// `web-push` implementation of [`PushSender`].
pub struct WebPushSender {
    client: HyperWebPushClient,
    private_key: String,
    subject: String,
}

impl std::fmt::Debug for WebPushSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebPushSender")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl WebPushSender {
    /// Sender signing with `private_key` (URL-safe base64) and `sub` claim `subject`.
    #[must_use]
    pub fn new(private_key: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            private_key: private_key.into(),
            subject: subject.into(),
        }
    }

    /// Reads the private key from `VAPID_PRIVATE_KEY`.
    pub fn from_env(subject: impl Into<String>) -> Result<Self> {
        let private_key = std::env::var("VAPID_PRIVATE_KEY")
            .inspect_err(|e| tracing::error!("VAPID_PRIVATE_KEY not available: {}", e))?;
        if private_key.trim().is_empty() {
            return Err(Error::Config {
                message: "VAPID_PRIVATE_KEY is empty".to_string(),
            });
        }
        Ok(Self::new(private_key.trim(), subject))
    }

    fn build_message(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<web_push::WebPushMessage, WebPushError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.as_str(),
            subscription.p256dh.as_str(),
            subscription.auth.as_str(),
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.private_key, web_push::URL_SAFE_NO_PAD, &info)?;
        signature.add_claim("sub", self.subject.as_str());

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_ttl(PUSH_TTL_SECS);
        builder.set_vapid_signature(signature.build()?);
        builder.build()
    }
}

fn classify(error: &WebPushError) -> PushFailure {
    match error {
        WebPushError::EndpointNotValid | WebPushError::EndpointNotFound => PushFailure::Gone,
        other => PushFailure::Other(other.to_string()),
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> std::result::Result<(), PushFailure> {
        let message = self
            .build_message(subscription, payload)
            .map_err(|e| classify(&e))?;
        self.client.send(message).await.map_err(|e| classify(&e))
    }
}
