//! Database configuration for the relational store.
//!
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The composite uniqueness of push subscriptions is added as a
//! separate index since entity attributes only cover single columns.

use crate::entities::{Notification, Promissory, PushSubscription, PushSubscriptionColumn, User};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Establishes a connection to the relational store.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    // SQLite will not create missing parent directories on its own
    let parent = database_url
        .strip_prefix("sqlite://")
        .and_then(|rest| rest.split('?').next())
        .and_then(|path| std::path::Path::new(path).parent());
    if let Some(parent) = parent.filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Promissory),
        schema.create_table_from_entity(Notification),
        schema.create_table_from_entity(PushSubscription),
    ];
    for mut table in tables {
        let statement = table.if_not_exists().to_owned();
        db.execute(builder.build(&statement)).await?;
    }

    let unique_device = Index::create()
        .name("idx_push_subscriptions_user_endpoint")
        .table(PushSubscription)
        .col(PushSubscriptionColumn::UserId)
        .col(PushSubscriptionColumn::Endpoint)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&unique_device)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NotificationModel, PromissoryModel, PushSubscriptionModel, UserModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<PromissoryModel> = Promissory::find().limit(1).all(&db).await?;
        let _: Vec<NotificationModel> = Notification::find().limit(1).all(&db).await?;
        let _: Vec<PushSubscriptionModel> = PushSubscription::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
