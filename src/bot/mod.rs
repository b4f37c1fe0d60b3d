//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord front-end of Promissoria: slash commands
//! for both parties, autocomplete, and a notifier that forwards each party's
//! new notifications as direct messages.

/// Discord command implementations (contract, notifications, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;
/// Direct-message notifier
pub mod notifier;

use crate::{
    config::AppConfig,
    core::ContractLedger,
    errors::{Error, Result},
    models::Role,
    observer::{LocalNotifier, NotificationFeed, observer_for, run_feed},
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Shared data available to all bot commands.
/// Holds the contract ledger (and through it the store and identities) plus
/// the application configuration.
pub struct BotData {
    /// Contract handle used by every command
    pub ledger: Arc<ContractLedger>,
    /// Loaded configuration
    pub config: Arc<AppConfig>,
}

impl BotData {
    /// Creates a new `BotData` instance.
    #[must_use]
    pub const fn new(ledger: Arc<ContractLedger>, config: Arc<AppConfig>) -> Self {
        Self { ledger, config }
    }

    /// Role of the Discord user, if they are one of the two parties.
    #[must_use]
    pub fn role_of(&self, user: serenity::UserId) -> Option<Role> {
        self.ledger.identities().by_discord_id(&user.to_string())
    }
}

/// Poise context with our data and error types.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Role of the command author; replies and returns `None` for strangers.
pub async fn require_party(ctx: Context<'_>) -> Result<Option<Role>> {
    let role = ctx.data().role_of(ctx.author().id);
    if role.is_none() {
        ctx.say("❌ You are not a party to this contract.").await?;
    }
    Ok(role)
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("An error occurred: {error}")).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Starts one DM-forwarding feed per party that has a Discord id.
async fn spawn_feeds(http: Arc<serenity::Http>, ledger: &ContractLedger, config: &AppConfig) {
    for role in [Role::Debtor, Role::Creditor] {
        let Some(discord_id) = ledger.identities().credential(role).discord_id.clone() else {
            continue;
        };
        let Ok(user) = discord_id.parse::<u64>().map(serenity::UserId::new) else {
            warn!("Discord id of {} is not numeric: {}", role, discord_id);
            continue;
        };

        let store = Arc::clone(ledger.store());
        let feed = match NotificationFeed::open(Arc::clone(&store), role.as_str()).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Could not open notification feed of {}: {}", role, e);
                continue;
            }
        };
        let observer = observer_for(store.as_ref(), role.as_str(), &config.feed);
        let notifier: Arc<dyn LocalNotifier> =
            Arc::new(notifier::DiscordNotifier::new(Arc::clone(&http), user));
        tokio::spawn(run_feed(feed, observer, notifier));
    }
}

/// Builds the poise framework and runs the Discord client until it stops.
#[instrument(skip(token, ledger, config))]
pub async fn run_bot(token: String, ledger: Arc<ContractLedger>, config: Arc<AppConfig>) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::status(),
                commands::installments(),
                commands::mark_paid(),
                commands::confirm(),
                commands::pix(),
                commands::notifications(),
                commands::read(),
                commands::clear_notifications(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                spawn_feeds(Arc::clone(&ctx.http), &ledger, &config).await;
                Ok(BotData::new(ledger, config))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;
