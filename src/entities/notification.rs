//! Notification entity - the in-app feed, one row per delivered notification.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// `notif-<uuid>`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Target user id
    pub user_id: String,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
    /// `payment_marked`, `payment_confirmed` or `reminder`
    #[sea_orm(column_name = "type")]
    pub kind: String,
    /// Read flag
    pub read: bool,
    /// Creation instant
    pub created_at: DateTimeUtc,
}

/// Notifications carry no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
