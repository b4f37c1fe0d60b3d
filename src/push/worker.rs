//! Background worker lifecycle and click handling.
//!
//! The worker runs outside any page. These functions decide what it does; the
//! host platform carries the decisions out.

use super::payload::ACTION_CLOSE;

/// Path opened when no app window exists.
pub const APP_ROOT: &str = "/";

/// What to do once the worker finished installing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    /// Activate now instead of waiting for every tab to close
    SkipWaiting,
}

/// What to do once the worker is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateStep {
    /// Take control of already open pages without a reload
    ClaimClients,
}

/// Install checkpoint.
#[must_use]
pub fn on_install() -> InstallStep {
    tracing::debug!("Worker installed");
    InstallStep::SkipWaiting
}

/// Activate checkpoint.
#[must_use]
pub fn on_activate() -> ActivateStep {
    tracing::debug!("Worker activated");
    ActivateStep::ClaimClients
}

/// An open page the worker can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    /// Platform id of the window
    pub id: String,
    /// Current URL
    pub url: String,
    /// Whether the platform lets the worker focus it
    pub focusable: bool,
}

/// Result of a notification click. The notification is closed in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Close action, nothing else
    Dismiss,
    /// Focus this already open window
    Focus(String),
    /// Open a new window at this path
    Open(String),
}

/// Decides the reaction to a click on a notification (`action` is `None` for
/// a click on the body).
#[must_use]
pub fn handle_click(action: Option<&str>, origin: &str, clients: &[ClientWindow]) -> ClickOutcome {
    if action == Some(ACTION_CLOSE) {
        return ClickOutcome::Dismiss;
    }

    clients
        .iter()
        .find(|client| client.focusable && client.url.starts_with(origin))
        .map_or_else(
            || ClickOutcome::Open(APP_ROOT.to_string()),
            |client| ClickOutcome::Focus(client.id.clone()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://promissoria.app";

    fn window(id: &str, url: &str, focusable: bool) -> ClientWindow {
        ClientWindow {
            id: id.to_string(),
            url: url.to_string(),
            focusable,
        }
    }

    #[test]
    fn test_close_only_dismisses() {
        let clients = [window("a", "https://promissoria.app/", true)];
        assert_eq!(
            handle_click(Some("close"), ORIGIN, &clients),
            ClickOutcome::Dismiss
        );
    }

    #[test]
    fn test_open_focuses_first_app_window() {
        let clients = [
            window("other", "https://elsewhere.example/", true),
            window("hidden", "https://promissoria.app/x", false),
            window("app", "https://promissoria.app/dashboard", true),
        ];
        assert_eq!(
            handle_click(Some("open"), ORIGIN, &clients),
            ClickOutcome::Focus("app".to_string())
        );
        assert_eq!(
            handle_click(None, ORIGIN, &clients),
            ClickOutcome::Focus("app".to_string())
        );
    }

    #[test]
    fn test_open_without_windows_opens_root() {
        assert_eq!(
            handle_click(None, ORIGIN, &[]),
            ClickOutcome::Open("/".to_string())
        );
    }

    #[test]
    fn test_lifecycle_checkpoints() {
        assert_eq!(on_install(), InstallStep::SkipWaiting);
        assert_eq!(on_activate(), ActivateStep::ClaimClients);
    }
}
