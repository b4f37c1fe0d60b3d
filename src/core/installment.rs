//! Installment state machine.
//!
//! `pending -> paid_by_debtor -> confirmed`, nothing else. There is no path
//! back: a confirmed installment stays confirmed and a marked one cannot be
//! un-marked. Invalid transitions are reported as [`TransitionOutcome::Ignored`]
//! rather than errors.

use crate::core::notify::DeliveryReport;
use crate::models::{Installment, InstallmentStatus, NotificationType, Role};
use chrono::{DateTime, Utc};

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Debtor says the installment is paid
    MarkPaid {
        /// Receipt URI or embedded image, stored as given
        receipt: Option<String>,
    },
    /// Creditor confirms receipt
    Confirm,
}

impl Transition {
    /// Status the installment must be in for this transition to apply.
    #[must_use]
    pub const fn required_status(&self) -> InstallmentStatus {
        match self {
            Self::MarkPaid { .. } => InstallmentStatus::Pending,
            Self::Confirm => InstallmentStatus::PaidByDebtor,
        }
    }

    /// Status after the transition.
    #[must_use]
    pub const fn target_status(&self) -> InstallmentStatus {
        match self {
            Self::MarkPaid { .. } => InstallmentStatus::PaidByDebtor,
            Self::Confirm => InstallmentStatus::Confirmed,
        }
    }

    /// The role allowed to trigger it.
    #[must_use]
    pub const fn actor(&self) -> Role {
        match self {
            Self::MarkPaid { .. } => Role::Debtor,
            Self::Confirm => Role::Creditor,
        }
    }

    /// Kind of notification sent to the other party.
    #[must_use]
    pub const fn notification_type(&self) -> NotificationType {
        match self {
            Self::MarkPaid { .. } => NotificationType::PaymentMarked,
            Self::Confirm => NotificationType::PaymentConfirmed,
        }
    }
}

/// Why a transition did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No installment with that id
    NotFound,
    /// Installment is not in the required status
    InvalidState {
        /// Status it was in
        current: InstallmentStatus,
    },
    /// The caller's role may not trigger this transition
    WrongRole {
        /// Role that may
        required: Role,
    },
}

/// Result of asking the ledger for a transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// State changed and was persisted
    Applied {
        /// The installment as written
        installment: Installment,
        /// Notification delivery, `None` if the notification could not be stored
        delivery: Option<DeliveryReport>,
    },
    /// Nothing changed and nothing was sent
    Ignored(IgnoreReason),
}

impl TransitionOutcome {
    /// Whether the installment changed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Computes the installment after `transition`, or why it cannot apply.
///
/// The input is never modified; callers persist the returned copy.
pub fn apply_transition(
    installment: &Installment,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<Installment, IgnoreReason> {
    if installment.status != transition.required_status() {
        return Err(IgnoreReason::InvalidState {
            current: installment.status,
        });
    }

    let mut next = installment.clone();
    next.status = transition.target_status();
    match transition {
        Transition::MarkPaid { receipt } => {
            next.debtor_confirmed_at = Some(now);
            next.paid_at = Some(now);
            if receipt.is_some() {
                next.receipt.clone_from(receipt);
            }
        }
        Transition::Confirm => {
            // Never stamp before the debtor's confirmation
            let floor = next.debtor_confirmed_at.unwrap_or(now);
            next.creditor_confirmed_at = Some(now.max(floor));
        }
    }
    Ok(next)
}
