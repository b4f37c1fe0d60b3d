//! User entity - one row per party (`debtor`, `creditor`).
//!
//! The creditor's PIX key lives here in the relational layout instead of on a
//! contract row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Role string, doubles as the user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// `"debtor"` or `"creditor"`
    pub role: String,
    /// Tax document snapshot
    pub document: Option<String>,
    /// Phone snapshot
    pub phone: Option<String>,
    /// Payment-routing key
    pub pix_key: Option<String>,
}

/// `User` has no navigable relations; notifications reference it by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
