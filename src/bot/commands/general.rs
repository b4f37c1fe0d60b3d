//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't touch the contract and
//! provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Promissoria Help**\n\
        Track the installments of the contract between the debtor and the creditor.\n\n\
        **Contract**\n\
        • `/status` - Progress, totals and the next installment due.\n\
        • `/installments` - Every installment with its due date and status.\n\
        • `/mark_paid <number> [receipt]` - Debtor: mark an installment as paid.\n\
        • `/confirm <number>` - Creditor: confirm you received a payment.\n\
        • `/pix [key]` - Show the PIX key, or set it (creditor).\n\n\
        **Notifications**\n\
        • `/notifications` - Your latest notifications.\n\
        • `/read <id>` - Mark a notification as read.\n\
        • `/clear_notifications` - Delete all your notifications.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
