//! Contract Discord commands - `status`, `installments`, `mark_paid`, `confirm` and `pix`.
//!
//! These commands call the contract ledger; the ledger persists each change
//! and notifies the other party.

use crate::core::{IgnoreReason, TransitionOutcome};
use crate::models::{DisplayStatus, Installment};

/// Short label with an emoji for an installment's displayed status.
#[must_use]
pub const fn status_label(status: DisplayStatus) -> &'static str {
    match status {
        DisplayStatus::Pending => "⏳ pending",
        DisplayStatus::Overdue => "⚠️ overdue",
        DisplayStatus::PaidByDebtor => "🕓 awaiting confirmation",
        DisplayStatus::Confirmed => "✅ confirmed",
    }
}

/// One line of the installment list.
#[must_use]
pub fn format_installment_line(installment: &Installment, now: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "`#{:>2}` {} · {} · {}",
        installment.number,
        installment.due_date.format("%d/%m/%Y"),
        crate::core::stats::format_brl(installment.amount),
        status_label(installment.display_status(now))
    )
}

/// Reply text for a transition outcome on installment `number`.
#[must_use]
pub fn describe_outcome(outcome: &TransitionOutcome, number: u32, applied: &str) -> String {
    match outcome {
        TransitionOutcome::Applied { .. } => applied.to_string(),
        TransitionOutcome::Ignored(IgnoreReason::NotFound) => {
            format!("❌ Installment {number} does not exist.")
        }
        TransitionOutcome::Ignored(IgnoreReason::InvalidState { current }) => {
            format!("ℹ️ Installment {number} is {current}; nothing changed.")
        }
        TransitionOutcome::Ignored(IgnoreReason::WrongRole { required }) => {
            format!("❌ Only the {required} can do that.")
        }
    }
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{describe_outcome, format_installment_line};
    use crate::{
        bot::{BotData, handlers::autocomplete, require_party},
        core::{
            Transition,
            stats::{format_brl, format_progress_bar},
        },
        errors::{Error, Result},
        models::{Installment, InstallmentStatus, Role},
    };
    use chrono::Utc;

    /// Shows contract progress, totals and the next installment due.
    #[poise::command(slash_command, prefix_command)]
    pub async fn status(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let ledger = &ctx.data().ledger;
        let now = Utc::now();
        let contract = ledger.contract().await?;
        let stats = ledger.stats(now).await?;

        let next_due = contract
            .installments
            .iter()
            .find(|p| p.status == InstallmentStatus::Pending)
            .map_or_else(
                || "nothing left to pay 🎉".to_string(),
                |p| format!("#{} on {}", p.number, p.due_date.format("%d/%m/%Y")),
            );

        let mut text = format!(
            "**Contract {} → {}**\n{}\n\
            • Paid: {} ({})\n\
            • Pending: {}\n\
            • Overdue: {}\n\
            • Outstanding: {}\n\
            • Next due: {}",
            contract.debtor_name,
            contract.creditor_name,
            format_progress_bar(stats.progress_percent(), None),
            stats.paid,
            format_brl(stats.paid_amount),
            stats.pending,
            stats.overdue,
            format_brl(stats.pending_amount),
            next_due,
        );
        if let Some(pix) = &contract.creditor_pix_key {
            text.push_str(&format!("\n• PIX key: `{pix}`"));
        }

        ctx.say(text).await?;
        Ok(())
    }

    /// Lists every installment with its due date and status.
    #[poise::command(slash_command, prefix_command)]
    pub async fn installments(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let contract = ctx.data().ledger.contract().await?;
        let now = Utc::now();

        let lines: Vec<String> = contract
            .installments
            .iter()
            .map(|p| format_installment_line(p, now))
            .collect();

        ctx.say(format!("**Installments**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Marks an installment as paid (debtor only). The creditor is notified.
    #[poise::command(slash_command, prefix_command)]
    pub async fn mark_paid(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Installment number"]
        #[autocomplete = "autocomplete::autocomplete_pending_installment"]
        number: u32,
        #[description = "Optional receipt link"] receipt: Option<String>,
    ) -> Result<()> {
        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };

        // Relay delivery can outlast the interaction deadline
        ctx.defer().await?;

        let receipt = receipt.filter(|r| !r.trim().is_empty());
        let outcome = ctx
            .data()
            .ledger
            .act_as(
                role,
                &Installment::id_for(number),
                Transition::MarkPaid { receipt },
            )
            .await?;

        ctx.say(describe_outcome(
            &outcome,
            number,
            &format!("✅ Installment {number} marked as paid. The creditor was notified."),
        ))
        .await?;
        Ok(())
    }

    /// Confirms receipt of an installment (creditor only). The debtor is notified.
    #[poise::command(slash_command, prefix_command)]
    pub async fn confirm(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Installment number"]
        #[autocomplete = "autocomplete::autocomplete_awaiting_confirmation"]
        number: u32,
    ) -> Result<()> {
        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };

        ctx.defer().await?;

        let outcome = ctx
            .data()
            .ledger
            .act_as(role, &Installment::id_for(number), Transition::Confirm)
            .await?;

        ctx.say(describe_outcome(
            &outcome,
            number,
            &format!("✅ Installment {number} confirmed. The debtor was notified."),
        ))
        .await?;
        Ok(())
    }

    /// Shows the creditor's PIX key, or sets it when a key is given (creditor only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn pix(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "New PIX key; leave empty to show the current one"] key: Option<String>,
    ) -> Result<()> {
        let Some(key) = key else {
            let contract = ctx.data().ledger.contract().await?;
            let reply = contract.creditor_pix_key.map_or_else(
                || "No PIX key set yet.".to_string(),
                |pix| format!("PIX key: `{pix}`"),
            );
            ctx.say(reply).await?;
            return Ok(());
        };

        let Some(role) = require_party(ctx).await? else {
            return Ok(());
        };
        if role != Role::Creditor {
            ctx.say("❌ Only the creditor can change the PIX key.").await?;
            return Ok(());
        }

        let key = key.trim();
        ctx.data()
            .ledger
            .update_creditor_pix_key(Some(key))
            .await?;
        if key.is_empty() {
            ctx.say("✅ PIX key cleared.").await?;
        } else {
            ctx.say(format!("✅ PIX key set to `{key}`.")).await?;
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
