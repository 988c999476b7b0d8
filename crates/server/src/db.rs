use std::env;

use goj_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub async fn init_pool_and_migrate() -> anyhow::Result<DatabaseConnection> {
    let database_url =
        env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    connect_and_migrate(database_url).await
}

pub async fn connect_and_migrate(
    options: impl Into<ConnectOptions>,
) -> anyhow::Result<DatabaseConnection> {
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}
