use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use torque_api::{
    app,
    state::{AppState, AuthConfig},
};
use torque_core::repository::UserRepository;
use torque_order::OrderService;
use torque_storage::image_store_from_settings;
use torque_store::{
    DbClient, PgCategoryRepository, PgItemRepository, PgOrderRepository, PgUserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "torque_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = torque_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Torque API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Bootstrap admin account
    let users = Arc::new(PgUserRepository::new(db.pool.clone()));
    let admin_hash = bcrypt::hash(&config.admin.password, bcrypt::DEFAULT_COST)
        .context("Failed to hash admin password")?;
    users
        .ensure_admin(&config.admin.email, &admin_hash)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin user: {}", e))?;

    let images = image_store_from_settings(&config.storage)
        .context("Failed to initialize image storage")?;

    let items = Arc::new(PgItemRepository::new(db.pool.clone()));
    let orders = Arc::new(OrderService::new(
        Arc::new(PgOrderRepository::new(db.pool.clone())),
        items.clone(),
        images,
    ));

    let app_state = AppState {
        categories: Arc::new(PgCategoryRepository::new(db.pool.clone())),
        items,
        users,
        orders,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
