//! Contract aggregate lifecycle.
//!
//! [`ContractLedger`] is the handle every front-end holds: it creates the
//! contract on first load, applies installment transitions, and fires the
//! matching notification once the write has been persisted.

use crate::{
    config::{IdentityTable, settings::ContractConfig},
    core::{
        installment::{IgnoreReason, Transition, TransitionOutcome, apply_transition},
        notify::{Dispatcher, NotificationMessage},
        stats::{ContractStats, compute_stats},
    },
    errors::{Error, Result},
    models::{Contract, Installment, InstallmentStatus, Role},
    storage::Storage,
};
use chrono::{DateTime, Months, NaiveTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Builds a fresh contract: every installment pending, equal amounts, due
/// monthly on the day of `schedule.first_due_date`.
#[must_use]
pub fn build_default_contract(
    schedule: &ContractConfig,
    identities: &IdentityTable,
    now: DateTime<Utc>,
) -> Contract {
    let first_due = schedule.first_due_date.and_time(NaiveTime::MIN).and_utc();

    let installments: Vec<Installment> = (1..=schedule.installments)
        .map(|number| Installment {
            id: Installment::id_for(number),
            number,
            amount: schedule.installment_amount,
            due_date: first_due
                .checked_add_months(Months::new(number - 1))
                .unwrap_or(first_due),
            status: InstallmentStatus::Pending,
            debtor_confirmed_at: None,
            creditor_confirmed_at: None,
            receipt: None,
            paid_at: None,
        })
        .collect();

    let debtor = identities.credential(Role::Debtor);
    let creditor = identities.credential(Role::Creditor);
    Contract {
        id: Contract::ID.to_string(),
        debtor_name: debtor.name.clone(),
        debtor_document: debtor.document.clone(),
        debtor_phone: debtor.phone.clone(),
        creditor_name: creditor.name.clone(),
        creditor_document: creditor.document.clone(),
        creditor_pix_key: None,
        total_amount: installments.iter().map(|p| p.amount).sum(),
        installments,
        created_at: now,
    }
}

/// Handle to the one contract of this deployment.
pub struct ContractLedger {
    store: Arc<dyn Storage>,
    dispatcher: Dispatcher,
    identities: IdentityTable,
    // One transition at a time within this process
    writer: Mutex<()>,
}

impl std::fmt::Debug for ContractLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractLedger")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl ContractLedger {
    /// Ledger over `store`, notifying through `dispatcher`.
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, dispatcher: Dispatcher, identities: IdentityTable) -> Self {
        Self {
            store,
            dispatcher,
            identities,
            writer: Mutex::new(()),
        }
    }

    /// Backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    /// Notification dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Identity table.
    #[must_use]
    pub const fn identities(&self) -> &IdentityTable {
        &self.identities
    }

    /// Loads the contract, creating and saving the default one if none exists.
    /// Missing user records for the two parties are created as well.
    #[instrument(skip(self, schedule))]
    pub async fn load_or_init(
        &self,
        schedule: &ContractConfig,
        now: DateTime<Utc>,
    ) -> Result<Contract> {
        let _guard = self.writer.lock().await;

        for role in [Role::Debtor, Role::Creditor] {
            if self.store.load_user(role.as_str()).await?.is_none() {
                self.store.save_user(&self.identities.by_role(role)).await?;
                debug!("Created user record for {}", role);
            }
        }

        if let Some(contract) = self.store.load_contract().await? {
            debug!(
                "Loaded contract with {} installments",
                contract.installments.len()
            );
            return Ok(contract);
        }

        let contract = build_default_contract(schedule, &self.identities, now);
        self.store.save_contract(&contract).await?;
        info!(
            "Created contract with {} installments of {}",
            contract.installments.len(),
            contract.unit_amount()
        );
        Ok(contract)
    }

    /// Current contract as stored.
    pub async fn contract(&self) -> Result<Contract> {
        self.store.load_contract().await?.ok_or(Error::ContractMissing)
    }

    /// Debtor marks an installment paid, optionally attaching a receipt.
    pub async fn mark_paid(
        &self,
        installment_id: &str,
        receipt: Option<String>,
    ) -> Result<TransitionOutcome> {
        self.mark_paid_at(installment_id, receipt, Utc::now()).await
    }

    /// [`Self::mark_paid`] at an explicit instant.
    pub async fn mark_paid_at(
        &self,
        installment_id: &str,
        receipt: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        self.transition(installment_id, &Transition::MarkPaid { receipt }, now)
            .await
    }

    /// Creditor confirms receipt of an installment.
    pub async fn confirm_payment(&self, installment_id: &str) -> Result<TransitionOutcome> {
        self.confirm_payment_at(installment_id, Utc::now()).await
    }

    /// [`Self::confirm_payment`] at an explicit instant.
    pub async fn confirm_payment_at(
        &self,
        installment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        self.transition(installment_id, &Transition::Confirm, now)
            .await
    }

    /// Applies `transition` on behalf of `role`. Only the transition's actor
    /// (debtor marks paid, creditor confirms) changes anything.
    pub async fn act_as(
        &self,
        role: Role,
        installment_id: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        self.act_as_at(role, installment_id, transition, Utc::now())
            .await
    }

    /// [`Self::act_as`] at an explicit instant.
    pub async fn act_as_at(
        &self,
        role: Role,
        installment_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let required = transition.actor();
        if role != required {
            debug!("Ignoring transition requested by the {}", role);
            return Ok(TransitionOutcome::Ignored(IgnoreReason::WrongRole {
                required,
            }));
        }
        self.transition(installment_id, &transition, now).await
    }

    #[instrument(skip(self, transition, now))]
    async fn transition(
        &self,
        installment_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let installment = {
            let _guard = self.writer.lock().await;
            let contract = self.contract().await?;

            let Some(current) = contract.installment(installment_id) else {
                debug!("Ignoring transition on unknown installment");
                return Ok(TransitionOutcome::Ignored(IgnoreReason::NotFound));
            };
            let next = match apply_transition(current, transition, now) {
                Ok(next) => next,
                Err(reason) => {
                    debug!("Ignoring transition: {:?}", reason);
                    return Ok(TransitionOutcome::Ignored(reason));
                }
            };

            self.store.save_installment(&next).await?;
            next
        };
        info!(
            "Installment {} is now {}",
            installment.number, installment.status
        );

        let delivery = match NotificationMessage::for_transition(
            transition.notification_type(),
            installment.number,
        ) {
            Some(message) => self
                .dispatcher
                .send(&message)
                .await
                .inspect_err(|e| warn!("Notification for {} failed: {}", installment.id, e))
                .ok(),
            None => None,
        };

        Ok(TransitionOutcome::Applied {
            installment,
            delivery,
        })
    }

    /// Sets (or clears, with `None` or blank) the creditor's PIX key on both
    /// the creditor's user record and the contract.
    pub async fn update_creditor_pix_key(&self, pix_key: Option<&str>) -> Result<()> {
        let pix_key = pix_key.map(str::trim).filter(|key| !key.is_empty());
        let _guard = self.writer.lock().await;

        let mut creditor = self
            .store
            .load_user(Role::Creditor.as_str())
            .await?
            .unwrap_or_else(|| self.identities.by_role(Role::Creditor));
        creditor.pix_key = pix_key.map(str::to_string);
        self.store.save_user(&creditor).await?;
        self.store.set_creditor_pix_key(pix_key).await?;

        info!("Creditor PIX key {}", if pix_key.is_some() { "updated" } else { "cleared" });
        Ok(())
    }

    /// Statistics as of `now`, always computed from the stored installments.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<ContractStats> {
        let contract = self.contract().await?;
        Ok(compute_stats(
            &contract.installments,
            contract.unit_amount(),
            now,
        ))
    }
}
