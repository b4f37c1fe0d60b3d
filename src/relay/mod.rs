//! Push relay - the stateless backend endpoint that stores device
//! subscriptions and fans notifications out to them.
//!
//! One JSON endpoint, dispatched on the `action` field. [`server`] is the
//! `axum` side, [`client`] the `reqwest` side used by the dispatcher and the
//! subscription manager.

/// `reqwest` client and the [`RelayApi`] seam
pub mod client;
/// Request and response bodies
pub mod protocol;
/// `axum` router and handlers
pub mod server;

pub use client::{HttpRelayClient, RelayApi};
pub use protocol::{SendReply, SendRequest};
pub use server::{RelayState, router, serve};
