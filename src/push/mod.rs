//! Push delivery: the relay-side sender, the device-side subscription flow,
//! and the background worker's payload and click handling.

/// Payload parsing for the background worker
pub mod payload;
/// Encrypted delivery to push services
pub mod sender;
/// Device subscription state machine
pub mod subscription;
/// Worker lifecycle and click routing
pub mod worker;

pub use payload::{DisplayNotification, parse_push_payload};
pub use sender::{PushFailure, PushSender, WebPushSender};
pub use subscription::{DeviceState, Permission, PushPlatform, SubscriptionManager};
pub use worker::{ClickOutcome, ClientWindow, handle_click, on_activate, on_install};
