//! Relay wire format.
//!
//! Requests are a JSON object with an `action` tag:
//!
//! ```json
//! {"action":"subscribe","userId":"debtor","subscriptionData":{"endpoint":"…","keys":{"p256dh":"…","auth":"…"}}}
//! {"action":"send","userId":"creditor","title":"…","message":"…","type":"payment_marked"}
//! {"action":"unsubscribe","userId":"debtor","subscriptionData":{"endpoint":"…"}}
//! ```
//!
//! Successful replies carry `success: true`; failures are `{"error": "..."}`
//! with a non-2xx status.

use crate::models::{NotificationType, SubscriptionData};
use serde::{Deserialize, Serialize};

/// Body of a `send` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Recipient user id
    pub user_id: String,
    /// Push title
    pub title: String,
    /// Push body
    pub message: String,
    /// Notification kind
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Id of an already stored notification; when present the relay does not
    /// insert another row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

/// `subscriptionData` of an `unsubscribe` action; only the endpoint is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EndpointRef {
    /// Push service URI, absent when the device had no local subscription
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Every request the relay understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RelayRequest {
    /// Store or refresh a device subscription
    #[serde(rename_all = "camelCase")]
    Subscribe {
        /// Owning user id
        user_id: String,
        /// Endpoint and keys
        subscription_data: SubscriptionData,
    },
    /// Persist a notification and push it to the user's devices
    Send(SendRequest),
    /// Remove a device subscription
    #[serde(rename_all = "camelCase")]
    Unsubscribe {
        /// Owning user id
        user_id: String,
        /// Endpoint to remove
        #[serde(default)]
        subscription_data: EndpointRef,
    },
}

/// Names of the actions, used to tell "unknown action" from "bad body".
pub const KNOWN_ACTIONS: [&str; 3] = ["subscribe", "send", "unsubscribe"];

/// Reply to `subscribe` and `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessReply {
    /// Always true
    pub success: bool,
}

/// Reply to `send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReply {
    /// Always true; delivery failures do not fail the request
    pub success: bool,
    /// Subscriptions found for the user
    pub subscription_count: usize,
    /// Pushes the push services accepted
    #[serde(default)]
    pub delivered: usize,
}

/// Body of every error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Description
    pub error: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscribe() {
        let request: RelayRequest = serde_json::from_value(json!({
            "action": "subscribe",
            "userId": "debtor",
            "subscriptionData": {
                "endpoint": "https://push.example/abc",
                "keys": {"p256dh": "pk", "auth": "secret"}
            }
        }))
        .unwrap();

        let RelayRequest::Subscribe {
            user_id,
            subscription_data,
        } = request
        else {
            panic!("expected subscribe");
        };
        assert_eq!(user_id, "debtor");
        assert_eq!(subscription_data.endpoint, "https://push.example/abc");
        assert_eq!(subscription_data.keys.auth, "secret");
    }

    #[test]
    fn test_parse_send_without_notification_id() {
        let request: RelayRequest = serde_json::from_value(json!({
            "action": "send",
            "userId": "creditor",
            "title": "t",
            "message": "m",
            "type": "payment_marked"
        }))
        .unwrap();

        assert_eq!(
            request,
            RelayRequest::Send(SendRequest {
                user_id: "creditor".to_string(),
                title: "t".to_string(),
                message: "m".to_string(),
                kind: NotificationType::PaymentMarked,
                notification_id: None,
            })
        );
    }

    #[test]
    fn test_unsubscribe_tolerates_missing_endpoint() {
        let request: RelayRequest = serde_json::from_value(json!({
            "action": "unsubscribe",
            "userId": "debtor",
            "subscriptionData": {}
        }))
        .unwrap();
        assert!(matches!(
            request,
            RelayRequest::Unsubscribe { subscription_data: EndpointRef { endpoint: None }, .. }
        ));
    }

    #[test]
    fn test_send_reply_shape() {
        let reply = SendReply {
            success: true,
            subscription_count: 2,
            delivered: 1,
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({"success": true, "subscriptionCount": 2, "delivered": 1})
        );
    }
}
