//! Direct-message notifier.
//!
//! Discord has no notion of a foreground page, so a party linked to a Discord
//! account always counts as backgrounded and every new notification becomes a
//! DM.

use crate::{errors::Result, models::Notification, observer::LocalNotifier};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Sends notifications as Discord direct messages to one user.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
    user: serenity::UserId,
}

impl DiscordNotifier {
    /// Notifier sending to `user`.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>, user: serenity::UserId) -> Self {
        Self { http, user }
    }
}

/// Message text of a notification.
#[must_use]
pub fn format_direct_message(notification: &Notification) -> String {
    format!("**{}**\n{}", notification.title, notification.message)
}

#[async_trait]
impl LocalNotifier for DiscordNotifier {
    fn permission_granted(&self) -> bool {
        true
    }

    fn is_foreground(&self) -> bool {
        false
    }

    async fn show(&self, notification: &Notification) -> Result<()> {
        self.user
            .direct_message(
                self.http.as_ref(),
                serenity::CreateMessage::new().content(format_direct_message(notification)),
            )
            .await?;
        tracing::debug!("Sent {} to {} by DM", notification.id, self.user);
        Ok(())
    }
}
