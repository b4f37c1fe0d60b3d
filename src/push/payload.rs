//! Push payload → displayed notification.
//!
//! Payloads come from outside and are never trusted: anything that is not a
//! JSON object is shown as plain text under the default title.

use serde::Serialize;
use serde_json::{Map, Value};

/// Title used when the payload carries none.
pub const DEFAULT_TITLE: &str = "PromissóriasApp";
/// Body used when the payload carries none.
pub const DEFAULT_BODY: &str = "New notification";
/// App icon.
pub const DEFAULT_ICON: &str = "/pwa-192x192.png";
/// Monochrome badge; not overridable by the payload.
pub const BADGE: &str = "/pwa-192x192.png";
/// Shared tag, so a new notification replaces the previous one.
pub const TAG: &str = "promissoria-notification";
/// Vibration pattern in milliseconds.
pub const VIBRATION: [u32; 3] = [200, 100, 200];

/// Action id that focuses or opens the app.
pub const ACTION_OPEN: &str = "open";
/// Action id that only dismisses.
pub const ACTION_CLOSE: &str = "close";

/// Button shown on the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    /// Id passed back on click
    pub action: String,
    /// Label
    pub title: String,
}

/// Everything needed to show one OS-level notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNotification {
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
    /// Icon URL
    pub icon: String,
    /// Badge URL
    pub badge: String,
    /// Replacement tag
    pub tag: String,
    /// Alert again when replacing a notification with the same tag
    pub renotify: bool,
    /// Stay on screen until the user acts
    pub require_interaction: bool,
    /// Vibration pattern
    pub vibrate: Vec<u32>,
    /// Buttons
    pub actions: Vec<NotificationAction>,
    /// `data` object of the payload, passed through untouched
    pub data: Value,
}

impl DisplayNotification {
    fn with_text(title: String, body: String, icon: String, data: Value) -> Self {
        Self {
            title,
            body,
            icon,
            badge: BADGE.to_string(),
            tag: TAG.to_string(),
            renotify: false,
            require_interaction: true,
            vibrate: VIBRATION.to_vec(),
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: "Open app".to_string(),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: "Close".to_string(),
                },
            ],
            data,
        }
    }
}

fn text_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Builds the notification to display for a raw push payload.
#[must_use]
pub fn parse_push_payload(payload: &[u8]) -> DisplayNotification {
    if payload.is_empty() {
        return DisplayNotification::with_text(
            DEFAULT_TITLE.to_string(),
            DEFAULT_BODY.to_string(),
            DEFAULT_ICON.to_string(),
            Value::Object(Map::new()),
        );
    }

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(object)) => DisplayNotification::with_text(
            text_field(&object, "title")
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            text_field(&object, "body")
                .or_else(|| text_field(&object, "message"))
                .unwrap_or(DEFAULT_BODY)
                .to_string(),
            text_field(&object, "icon")
                .unwrap_or(DEFAULT_ICON)
                .to_string(),
            object
                .get("data")
                .filter(|data| data.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        ),
        parsed => {
            if let Err(e) = parsed {
                tracing::debug!("Push payload is not JSON, showing as text: {}", e);
            }
            DisplayNotification::with_text(
                DEFAULT_TITLE.to_string(),
                String::from_utf8_lossy(payload).into_owned(),
                DEFAULT_ICON.to_string(),
                Value::Object(Map::new()),
            )
        }
    }
}
