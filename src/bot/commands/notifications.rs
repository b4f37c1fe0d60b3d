//! Notification Discord commands - `notifications`, `read` and `clear_notifications`.
//!
//! Each party only ever sees the feed addressed to their own role.

use crate::models::Notification;

/// How many notifications `/notifications` lists.
pub const LIST_LIMIT: usize = 10;

/// Renders the newest `LIST_LIMIT` notifications, unread ones marked.
#[must_use]
pub fn format_notification_list(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "No notifications.".to_string();
    }

    let unread = notifications.iter().filter(|n| !n.read).count();
    let mut text = format!("**Notifications** ({unread} unread)\n");
    for notification in notifications.iter().take(LIST_LIMIT) {
        text.push_str(&format!(
            "{} **{}** {}\n  `{}` · {}\n",
            if notification.read { "▫️" } else { "🔵" },
            notification.title,
            notification.message,
            notification.id,
            notification.created_at.format("%d/%m/%Y %H:%M"),
        ));
    }
    text
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::format_notification_list;
    use crate::{
        bot::{BotData, handlers::autocomplete, require_party},
        errors::{Error, Result},
    };

    /// Lists your latest notifications.
    #[poise::command(slash_command, prefix_command)]
    pub async fn notifications(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };
        let notifications = ctx
            .data()
            .ledger
            .store()
            .notifications_for(role.as_str())
            .await?;
        ctx.say(format_notification_list(&notifications)).await?;
        Ok(())
    }

    /// Marks one of your notifications as read.
    #[poise::command(slash_command, prefix_command)]
    pub async fn read(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Notification id"]
        #[autocomplete = "autocomplete::autocomplete_unread_notification"]
        id: String,
    ) -> Result<()> {
        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };
        let store = ctx.data().ledger.store();

        let owned = store
            .notifications_for(role.as_str())
            .await?
            .iter()
            .any(|n| n.id == id);
        if !owned || !store.mark_notification_read(&id).await? {
            ctx.say(format!("❌ Notification `{id}` not found.")).await?;
            return Ok(());
        }

        ctx.say("✅ Marked as read.").await?;
        Ok(())
    }

    /// Deletes all of your notifications.
    #[poise::command(slash_command, prefix_command)]
    pub async fn clear_notifications(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };
        let removed = ctx
            .data()
            .ledger
            .store()
            .clear_notifications(role.as_str())
            .await?;
        ctx.say(format!("🧹 Removed {removed} notification(s).")).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
