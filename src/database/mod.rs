use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{error, info};

use crate::orders::store::StoreError;

pub mod models;
pub mod schema;
pub mod store;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn create_db_pool(
    database_url: &str,
    max_size: u32,
) -> Result<PgPool, Box<dyn std::error::Error + Send + Sync>> {
    info!("Connecting to database");

    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| {
            error!("Failed to create database connection pool: {}", e);
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>
        })?;

    // Verify connection works
    let _conn = get_conn(&pool)?;

    info!("Successfully connected to database");
    Ok(pool)
}

/// Applies any migrations embedded from `migrations/` that have not run yet.
pub fn run_migrations(pool: &PgPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = get_conn(pool)?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
        error!("Failed to run database migrations: {}", e);
        e
    })?;
    for version in &applied {
        info!("Applied migration {}", version);
    }
    Ok(())
}

pub fn get_conn(pool: &PgPool) -> Result<PgPooledConnection, StoreError> {
    pool.get().map_err(|e| {
        error!("Failed to get database connection from pool: {}", e);
        StoreError::Pool(e.to_string())
    })
}
