//! Paid/pending/overdue aggregation.
//!
//! Recomputed on every call because overdue depends on "now". Nothing here is
//! cached.

use crate::models::{Installment, InstallmentStatus};
use chrono::{DateTime, Utc};

/// Counts and totals over the installment set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractStats {
    /// Confirmed installments
    pub paid: usize,
    /// Not confirmed and not overdue (includes paid-by-debtor)
    pub pending: usize,
    /// Pending and past due
    pub overdue: usize,
    /// All installments
    pub total: usize,
    /// `paid * unit_amount`
    pub paid_amount: f64,
    /// `(pending + overdue) * unit_amount`
    pub pending_amount: f64,
}

impl ContractStats {
    /// Share of confirmed installments, 0-100. Zero when there are no installments.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.paid as f64 / self.total as f64) * 100.0
    }
}

/// Partitions `installments` at `now` and prices them at `unit_amount` each.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_stats(installments: &[Installment], unit_amount: f64, now: DateTime<Utc>) -> ContractStats {
    let (mut paid, mut pending, mut overdue) = (0, 0, 0);
    for installment in installments {
        if installment.status == InstallmentStatus::Confirmed {
            paid += 1;
        } else if installment.is_overdue(now) {
            overdue += 1;
        } else {
            pending += 1;
        }
    }

    ContractStats {
        paid,
        pending,
        overdue,
        total: installments.len(),
        paid_amount: paid as f64 * unit_amount,
        pending_amount: (pending + overdue) as f64 * unit_amount,
    }
}

/// Text progress bar like `[████████░░] 80.0%`.
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress is in [0, 100] and length is small, so the product fits
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {progress_percent:.1}%",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}

/// Formats an amount as Brazilian reais, e.g. `R$ 20.000,00`.
#[must_use]
pub fn format_brl(amount: f64) -> String {
    let negative = amount < 0.0;
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}R$ {grouped},{cents}", if negative { "-" } else { "" })
}
