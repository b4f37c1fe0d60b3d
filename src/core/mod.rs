//! Core business logic - framework-agnostic contract, installment and
//! notification operations. The bot and the relay both call into this layer.

/// Contract aggregate lifecycle and the ledger handle
pub mod contract;
/// Installment state machine
pub mod installment;
/// Notification composition and multi-channel dispatch
pub mod notify;
/// Recurring due-date reminders
pub mod reminder;
/// Paid/pending/overdue aggregation
pub mod stats;

pub use contract::ContractLedger;
pub use installment::{IgnoreReason, Transition, TransitionOutcome};
pub use notify::{DeliveryReport, Dispatcher, NotificationMessage, PushOutcome};
pub use reminder::ReminderScheduler;
pub use stats::ContractStats;
