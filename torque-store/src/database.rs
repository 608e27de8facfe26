use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use torque_core::StoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Maps sqlx failures onto [`StoreError`]. Unique violations are resolved
/// to the logical key name via the Postgres constraint name.
pub(crate) fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let constraint = match db.constraint() {
                Some("orders_request_id_key") => "request_id",
                Some("items_sku_key") => "sku",
                Some("users_email_key") => "email",
                Some("categories_name_key") => "name",
                _ => "unique",
            };
            return StoreError::Duplicate { constraint };
        }
        if db.is_foreign_key_violation() {
            return StoreError::Referenced(
                db.constraint().unwrap_or("foreign key").to_string(),
            );
        }
    }
    StoreError::Backend(e.to_string())
}
