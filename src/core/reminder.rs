//! Recurring due-date reminders.
//!
//! Each run reminds the debtor of every pending installment due within the
//! lookahead window. Runs do not remember each other, so an installment that
//! stays in the window is reminded on every run until it is paid.

use crate::{
    config::settings::ReminderConfig,
    core::notify::{Dispatcher, NotificationMessage},
    errors::Result,
    models::{Installment, InstallmentStatus},
    storage::Storage,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Whether `installment` gets a reminder at `now`: pending and due within
/// `[now, now + lookahead]`.
#[must_use]
pub fn due_for_reminder(installment: &Installment, now: DateTime<Utc>, lookahead: Duration) -> bool {
    installment.status == InstallmentStatus::Pending
        && installment.due_date >= now
        && now
            .checked_add_signed(lookahead)
            .is_some_and(|end| installment.due_date <= end)
}

/// Periodic reminder job.
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn Storage>,
    dispatcher: Dispatcher,
    config: ReminderConfig,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReminderScheduler {
    /// Scheduler reading from `store` and notifying through `dispatcher`.
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, dispatcher: Dispatcher, config: ReminderConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    /// One pass at `now`. Returns how many reminders were stored.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let Some(contract) = self.store.load_contract().await? else {
            debug!("No contract yet, nothing to remind");
            return Ok(0);
        };

        let Some(lookahead) = self.config.lookahead() else {
            warn!(
                "Skipping reminders: lookahead_days {} is out of range",
                self.config.lookahead_days
            );
            return Ok(0);
        };
        let mut sent = 0;
        for installment in contract
            .installments
            .iter()
            .filter(|p| due_for_reminder(p, now, lookahead))
        {
            let message = NotificationMessage::reminder(installment.number, installment.due_date);
            match self.dispatcher.send(&message).await {
                Ok(_) => sent += 1,
                Err(e) => warn!("Reminder for installment {} failed: {}", installment.number, e),
            }
        }

        if sent > 0 {
            info!("Sent {} payment reminder(s)", sent);
        }
        Ok(sent)
    }

    /// Runs immediately and then every `interval_secs` for the life of the
    /// process. The task is never cancelled.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.interval().max(std::time::Duration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    warn!("Reminder run failed: {}", e);
                }
            }
        })
    }
}
