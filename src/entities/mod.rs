//! Entity module - `SeaORM` definitions for the relational store.
//! The tables mirror the remote layout: users, promissories, notifications and
//! push subscriptions, with contract fields spread across users and promissories.

pub mod notification;
pub mod promissory;
pub mod push_subscription;
pub mod user;

// Re-export specific types to avoid conflicts
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use promissory::{Column as PromissoryColumn, Entity as Promissory, Model as PromissoryModel};
pub use push_subscription::{
    Column as PushSubscriptionColumn, Entity as PushSubscription, Model as PushSubscriptionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
