//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggestions only offer installments a transition can apply to, and only
//! the caller's own notifications.

use crate::{
    bot::BotData,
    errors::Error,
    models::{Installment, InstallmentStatus},
};
use poise::serenity_prelude as serenity;

/// Discord shows at most this many choices.
const MAX_CHOICES: usize = 25;
/// Discord limit on a choice label.
const MAX_LABEL_CHARS: usize = 100;

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let mut truncated: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

/// Installments in `status` whose number starts with `partial`, as (label, number).
#[must_use]
pub fn installment_choices(
    installments: &[Installment],
    status: InstallmentStatus,
    partial: &str,
) -> Vec<(String, u32)> {
    let partial = partial.trim();
    installments
        .iter()
        .filter(|p| p.status == status)
        .filter(|p| p.number.to_string().starts_with(partial))
        .take(MAX_CHOICES)
        .map(|p| {
            (
                format!("#{} · due {}", p.number, p.due_date.format("%d/%m/%Y")),
                p.number,
            )
        })
        .collect()
}

async fn installment_autocomplete(
    ctx: poise::Context<'_, BotData, Error>,
    status: InstallmentStatus,
    partial: &str,
) -> Vec<serenity::AutocompleteChoice> {
    let Ok(contract) = ctx.data().ledger.contract().await else {
        return Vec::new();
    };
    installment_choices(&contract.installments, status, partial)
        .into_iter()
        .map(|(label, number)| serenity::AutocompleteChoice::new(label, number))
        .collect()
}

/// Suggests installments the debtor can still mark as paid.
pub async fn autocomplete_pending_installment(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<serenity::AutocompleteChoice> {
    installment_autocomplete(ctx, InstallmentStatus::Pending, partial).await
}

/// Suggests installments waiting for the creditor's confirmation.
pub async fn autocomplete_awaiting_confirmation(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<serenity::AutocompleteChoice> {
    installment_autocomplete(ctx, InstallmentStatus::PaidByDebtor, partial).await
}

/// Suggests the caller's unread notifications.
pub async fn autocomplete_unread_notification(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<serenity::AutocompleteChoice> {
    let Some(role) = ctx.data().role_of(ctx.author().id) else {
        return Vec::new();
    };
    let Ok(notifications) = ctx
        .data()
        .ledger
        .store()
        .notifications_for(role.as_str())
        .await
    else {
        return Vec::new();
    };

    let partial = partial.to_lowercase();
    notifications
        .into_iter()
        .filter(|n| !n.read)
        .filter(|n| {
            n.id.contains(&partial)
                || n.title.to_lowercase().contains(&partial)
                || n.message.to_lowercase().contains(&partial)
        })
        .take(MAX_CHOICES)
        .map(|n| {
            serenity::AutocompleteChoice::new(
                truncate_label(&format!("{} {}", n.title, n.message)),
                n.id,
            )
        })
        .collect()
}
