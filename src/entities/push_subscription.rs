//! Push subscription entity - one row per registered device and user.
//!
//! `(user_id, endpoint)` is unique; see [`crate::config::database::create_tables`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Push subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_subscriptions")]
pub struct Model {
    /// Surrogate key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user id
    pub user_id: String,
    /// Push service URI
    pub endpoint: String,
    /// Client public key
    pub p256dh: String,
    /// Auth secret
    pub auth: String,
    /// Last registration time
    pub updated_at: DateTimeUtc,
}

/// Subscriptions reference users by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
