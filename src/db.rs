use crate::config::AppConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes the database connection pool.
pub async fn connect(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let mut opts = ConnectOptions::new(cfg.database_url.clone());
    opts.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let db = Database::connect(opts).await?;
    info!("Database connection established");
    Ok(db)
}

/// Applies pending migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    crate::migrator::Migrator::up(db, None).await?;
    info!("Database migrations applied");
    Ok(())
}
