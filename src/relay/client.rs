//! Client side of the relay.
//!
//! [`RelayApi`] is the seam the dispatcher and the subscription manager talk
//! to; [`HttpRelayClient`] is the production implementation. No retries: a
//! failed call is reported to the caller, who logs it.

use super::protocol::{EndpointRef, ErrorReply, RelayRequest, SendReply, SendRequest};
use crate::{
    errors::{Error, Result},
    models::SubscriptionData,
};
use async_trait::async_trait;
use std::time::Duration;

/// Operations the relay offers.
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Registers or refreshes a device subscription for `user_id`.
    async fn subscribe(&self, user_id: &str, subscription: &SubscriptionData) -> Result<()>;

    /// Asks the relay to push a notification to every device of the recipient.
    async fn send(&self, request: &SendRequest) -> Result<SendReply>;

    /// Removes the device with `endpoint`; `None` when the device has no local subscription.
    async fn unsubscribe(&self, user_id: &str, endpoint: Option<&str>) -> Result<()>;
}

/// `reqwest` implementation of [`RelayApi`].
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    http: reqwest::Client,
    url: String,
}

impl HttpRelayClient {
    /// Client posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn post(&self, request: &RelayRequest) -> Result<reqwest::Response> {
        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorReply>(&body).map_or(body, |reply| reply.error);
        Err(Error::Relay {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    async fn subscribe(&self, user_id: &str, subscription: &SubscriptionData) -> Result<()> {
        self.post(&RelayRequest::Subscribe {
            user_id: user_id.to_string(),
            subscription_data: subscription.clone(),
        })
        .await?;
        Ok(())
    }

    async fn send(&self, request: &SendRequest) -> Result<SendReply> {
        let response = self.post(&RelayRequest::Send(request.clone())).await?;
        Ok(response.json().await?)
    }

    async fn unsubscribe(&self, user_id: &str, endpoint: Option<&str>) -> Result<()> {
        self.post(&RelayRequest::Unsubscribe {
            user_id: user_id.to_string(),
            subscription_data: EndpointRef {
                endpoint: endpoint.map(str::to_string),
            },
        })
        .await?;
        Ok(())
    }
}
