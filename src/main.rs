use dotenvy::dotenv;
use promissoria::{
    bot,
    config::{self, AppConfig},
    core::{ContractLedger, Dispatcher, ReminderScheduler},
    errors::{Error, Result},
    push::WebPushSender,
    relay::{self, HttpRelayClient, RelayApi, RelayState},
    storage,
};
use std::{env, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Starts the relay server in the background when `relay.bind` is set.
fn spawn_relay(config: &AppConfig, store: &Arc<dyn storage::Storage>) -> Result<()> {
    let Some(bind) = config.relay.bind.clone() else {
        return Ok(());
    };

    let sender = WebPushSender::from_env(config.push.subject.clone())?;
    let state = RelayState::new(Arc::clone(store), Arc::new(sender));
    tokio::spawn(async move {
        if let Err(e) = relay::serve(&bind, state).await {
            error!("Relay server stopped: {}", e);
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = Arc::new(config::load_app_configuration()?);
    info!("Successfully processed application configuration.");

    // 4. Open the selected store
    let store = storage::open_storage(&app_config)
        .await
        .inspect(|_| info!("Storage initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize storage: {}", e))?;

    // 5. Wire the dispatcher and load (or create) the contract
    let relay_client: Option<Arc<dyn RelayApi>> = match &app_config.relay.url {
        Some(url) => Some(Arc::new(HttpRelayClient::new(url.as_str())?)),
        None => {
            warn!("No relay URL configured; push notifications are disabled");
            None
        }
    };
    let dispatcher = Dispatcher::new(Arc::clone(&store), relay_client);
    let identities = config::IdentityTable::new(
        app_config.debtor.clone(),
        app_config.creditor.clone(),
    );
    let ledger = Arc::new(ContractLedger::new(
        Arc::clone(&store),
        dispatcher.clone(),
        identities,
    ));
    ledger
        .load_or_init(&app_config.contract, chrono::Utc::now())
        .await
        .inspect_err(|e| error!("Failed to load contract: {}", e))?;

    // 6. Reminders: one run now, then every interval, for the life of the process
    let _reminders = ReminderScheduler::new(
        Arc::clone(&store),
        dispatcher,
        app_config.reminders.clone(),
    )
    .spawn();

    // 7. Relay server
    spawn_relay(&app_config, &store)?;

    // 8. Run the bot; DISCORD_BOT_TOKEN is read directly before use
    match env::var("DISCORD_BOT_TOKEN") {
        Ok(token) => bot::run_bot(token, ledger, app_config).await?,
        Err(e) => {
            info!("DISCORD_BOT_TOKEN not set ({}); running without the bot", e);
            tokio::signal::ctrl_c().await.map_err(Error::Io)?;
            info!("Shutting down");
        }
    }

    Ok(())
}
