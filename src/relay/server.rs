//! Relay HTTP server.
//!
//! Stateless per request: every invocation validates the action, performs its
//! store reads and writes, and replies. A `send` inserts the notification row
//! (unless the caller already stored it) and then pushes to each subscription
//! in turn. There is no transaction across those steps; a device that fails is
//! logged and skipped, and nothing is retried.

use super::protocol::{
    ErrorReply, KNOWN_ACTIONS, RelayRequest, SendReply, SendRequest, SuccessReply,
};
use crate::{
    errors::{Error, Result},
    models::{Notification, PushSubscription},
    push::sender::{PushFailure, PushSender},
    storage::Storage,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct RelayState {
    store: Arc<dyn Storage>,
    sender: Arc<dyn PushSender>,
}

impl RelayState {
    /// State over `store`, delivering through `sender`.
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, sender: Arc<dyn PushSender>) -> Self {
        Self { store, sender }
    }
}

/// Error reply of the relay.
#[derive(Debug)]
enum RelayError {
    BadRequest(String),
    Internal(String),
}

impl From<Error> for RelayError {
    fn from(value: Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            Self::Internal(error) => {
                warn!("Relay request failed: {}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, error)
            }
        };
        (status, Json(ErrorReply { error })).into_response()
    }
}

/// Router with the relay endpoint at `/` and `/send-push`, CORS open.
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/", post(handle))
        .route("/send-push", post(handle))
        .layer(cors)
        .with_state(state)
}

/// Binds `addr` and serves the relay until the process exits.
#[instrument(skip(state))]
pub async fn serve(addr: &str, state: RelayState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn parse_request(body: &[u8]) -> std::result::Result<RelayRequest, RelayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::BadRequest("Missing action".to_string()))?;
    if !KNOWN_ACTIONS.contains(&action) {
        return Err(RelayError::BadRequest("Unknown action".to_string()));
    }
    serde_json::from_value(value)
        .map_err(|e| RelayError::BadRequest(format!("Invalid request: {e}")))
}

async fn handle(
    State(state): State<RelayState>,
    body: Bytes,
) -> std::result::Result<Response, RelayError> {
    match parse_request(&body)? {
        RelayRequest::Subscribe {
            user_id,
            subscription_data,
        } => {
            let subscription = PushSubscription::from_data(user_id, subscription_data);
            state.store.upsert_push_subscription(&subscription).await?;
            info!("Stored push subscription for {}", subscription.user_id);
            Ok(Json(SuccessReply { success: true }).into_response())
        }
        RelayRequest::Send(request) => Ok(Json(deliver(&state, &request).await?).into_response()),
        RelayRequest::Unsubscribe {
            user_id,
            subscription_data,
        } => {
            if let Some(endpoint) = subscription_data.endpoint {
                let removed = state
                    .store
                    .delete_push_subscription(&user_id, &endpoint)
                    .await?;
                info!("Removed {} push subscription(s) for {}", removed, user_id);
            } else {
                info!("Unsubscribe for {} without endpoint, nothing to remove", user_id);
            }
            Ok(Json(SuccessReply { success: true }).into_response())
        }
    }
}

/// Stores the notification if needed and pushes it to every device of the recipient.
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn deliver(state: &RelayState, request: &SendRequest) -> Result<SendReply> {
    if request.notification_id.is_none() {
        let notification = Notification::new(
            request.user_id.as_str(),
            request.title.as_str(),
            request.message.as_str(),
            request.kind,
            chrono::Utc::now(),
        );
        state.store.insert_notification(&notification).await?;
    }

    let subscriptions = state.store.push_subscriptions_for(&request.user_id).await?;
    if subscriptions.is_empty() {
        info!("No push subscriptions for {}", request.user_id);
        return Ok(SendReply {
            success: true,
            subscription_count: 0,
            delivered: 0,
        });
    }

    let payload = serde_json::to_vec(&json!({
        "title": request.title,
        "body": request.message,
        "type": request.kind,
        "data": { "type": request.kind },
    }))?;

    let mut delivered = 0;
    for subscription in &subscriptions {
        match state.sender.send(subscription, &payload).await {
            Ok(()) => delivered += 1,
            Err(PushFailure::Gone) => {
                info!("Pruning expired push endpoint {}", subscription.endpoint);
                if let Err(e) = state
                    .store
                    .delete_push_subscription(&subscription.user_id, &subscription.endpoint)
                    .await
                {
                    warn!("Failed to prune {}: {}", subscription.endpoint, e);
                }
            }
            Err(PushFailure::Other(e)) => {
                warn!("Push to {} failed: {}", subscription.endpoint, e);
            }
        }
    }

    Ok(SendReply {
        success: true,
        subscription_count: subscriptions.len(),
        delivered,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{RecordingPushSender, sample_subscription, setup_remote_store};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn state_with(sender: Arc<RecordingPushSender>) -> Result<RelayState> {
        let store: Arc<dyn Storage> = Arc::new(setup_remote_store().await?);
        Ok(RelayState::new(store, sender))
    }

    async fn call(state: &RelayState, body: Value) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(
                Request::post("/send-push")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_subscribe_is_an_upsert() -> Result<()> {
        let state = state_with(Arc::new(RecordingPushSender::default())).await?;
        let body = json!({
            "action": "subscribe",
            "userId": "debtor",
            "subscriptionData": {
                "endpoint": "https://push.example/1",
                "keys": {"p256dh": "pk", "auth": "a"}
            }
        });

        let (status, reply) = call(&state, body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"success": true}));
        call(&state, body).await;

        assert_eq!(state.store.push_subscriptions_for("debtor").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_without_subscriptions_succeeds() -> Result<()> {
        let state = state_with(Arc::new(RecordingPushSender::default())).await?;
        let (status, reply) = call(
            &state,
            json!({"action": "send", "userId": "creditor", "title": "t", "message": "m", "type": "payment_marked"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["success"], true);
        assert_eq!(reply["subscriptionCount"], 0);
        assert_eq!(state.store.notifications_for("creditor").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_with_stored_id_does_not_insert_again() -> Result<()> {
        let sender = Arc::new(RecordingPushSender::default());
        let state = state_with(Arc::clone(&sender)).await?;
        state
            .store
            .upsert_push_subscription(&sample_subscription("creditor", "https://push.example/1"))
            .await?;

        let (_, reply) = call(
            &state,
            json!({"action": "send", "userId": "creditor", "title": "t", "message": "m",
                   "type": "payment_marked", "notificationId": "notif-1"}),
        )
        .await;

        assert_eq!(reply["subscriptionCount"], 1);
        assert_eq!(reply["delivered"], 1);
        assert!(state.store.notifications_for("creditor").await?.is_empty());

        let sent = sender.sent.lock().await;
        let payload: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(payload["title"], "t");
        assert_eq!(payload["body"], "m");
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_delivery_and_pruning() -> Result<()> {
        let sender = Arc::new(RecordingPushSender::default());
        sender
            .fail_endpoint("https://push.example/gone", PushFailure::Gone)
            .await;
        sender
            .fail_endpoint(
                "https://push.example/flaky",
                PushFailure::Other("503".to_string()),
            )
            .await;
        let state = state_with(Arc::clone(&sender)).await?;
        for endpoint in [
            "https://push.example/ok",
            "https://push.example/gone",
            "https://push.example/flaky",
        ] {
            state
                .store
                .upsert_push_subscription(&sample_subscription("debtor", endpoint))
                .await?;
        }

        let (status, reply) = call(
            &state,
            json!({"action": "send", "userId": "debtor", "title": "t", "message": "m", "type": "reminder"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["subscriptionCount"], 3);
        assert_eq!(reply["delivered"], 1);

        let remaining: Vec<String> = state
            .store
            .push_subscriptions_for("debtor")
            .await?
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(
            remaining,
            vec!["https://push.example/ok", "https://push.example/flaky"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_row() -> Result<()> {
        let state = state_with(Arc::new(RecordingPushSender::default())).await?;
        state
            .store
            .upsert_push_subscription(&sample_subscription("debtor", "https://push.example/1"))
            .await?;

        let (status, _) = call(
            &state,
            json!({"action": "unsubscribe", "userId": "debtor", "subscriptionData": {"endpoint": "https://push.example/1"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.store.push_subscriptions_for("debtor").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_requests() -> Result<()> {
        let state = state_with(Arc::new(RecordingPushSender::default())).await?;

        let (status, reply) = call(&state, json!({"action": "explode"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({"error": "Unknown action"}));

        let (status, reply) = call(&state, json!({"userId": "debtor"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "Missing action");

        let (status, _) = call(&state, json!({"action": "send", "userId": "debtor"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_cors_preflight() -> Result<()> {
        let state = state_with(Arc::new(RecordingPushSender::default())).await?;
        let response = router(state)
            .oneshot(
                Request::options("/send-push")
                    .header(header::ORIGIN, "https://app.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,apikey")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        Ok(())
    }
}
