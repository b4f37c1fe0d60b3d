//! Promissory entity - one row per installment of the contract.
//!
//! `status` holds `pending`, `paid_by_debtor` or `confirmed`; overdue is
//! computed at read time and never written.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Installment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promissories")]
pub struct Model {
    /// `prom-<number>`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// 1-based ordering key
    pub number: i32,
    /// Amount due
    pub amount: f64,
    /// Due instant
    pub due_date: DateTimeUtc,
    /// Persisted status
    pub status: String,
    /// When the debtor marked it paid
    pub debtor_confirmed_at: Option<DateTimeUtc>,
    /// When the creditor confirmed receipt
    pub creditor_confirmed_at: Option<DateTimeUtc>,
    /// Receipt URI or embedded image
    pub receipt_url: Option<String>,
    /// When the debtor paid
    pub paid_at: Option<DateTimeUtc>,
    /// Creation time of the contract this row belongs to
    pub created_at: DateTimeUtc,
}

/// Installments stand alone in the relational layout
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
