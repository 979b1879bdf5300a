mod api;
mod application;
mod domain;
mod infrastructure;
mod ports;

use anyhow::Context;
use api::AppState;
use application::PaymentService;
use infrastructure::adapters::{
    EnvSettingsProvider, InMemoryOrderRepository, MySqlOrderRepository, MySqlSettingsProvider,
};
use infrastructure::config::{OrderStoreKind, SettingsSource};
use infrastructure::gateways::build_http_client;
use infrastructure::{AppConfig, GatewayRegistry};
use ports::OrderRepositoryPort;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting payment reconciler...");

    let config = AppConfig::from_env()?;

    let pool = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = MySqlPool::connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database connected and migrated");
            Some(Arc::new(pool))
        }
        None => None,
    };
    let require_pool = || pool.clone().context("DATABASE_URL must be set");

    let client = build_http_client(Duration::from_secs(config.http_timeout_secs))?;
    let registry = match config.settings_source {
        SettingsSource::Database => {
            GatewayRegistry::new(Arc::new(MySqlSettingsProvider::new(require_pool()?)), client)
        }
        SettingsSource::Env => GatewayRegistry::new(Arc::new(EnvSettingsProvider::new()), client),
    };
    info!(settings_source = ?config.settings_source, "Gateway adapters registered");

    let cors = api::create_cors_layer(config.cors_origin.as_deref())?;

    if config.require_webhook_signatures {
        info!("Unsigned webhooks will be rejected");
    } else {
        warn!("Unsigned webhooks are accepted; set REQUIRE_WEBHOOK_SIGNATURES=true to reject them");
    }

    match config.order_store {
        OrderStoreKind::MySql => {
            let repository = Arc::new(MySqlOrderRepository::new(require_pool()?));
            serve(&config, repository, registry, cors).await
        }
        OrderStoreKind::Memory => {
            warn!("Using the in-memory order store; orders are lost on restart");
            serve(&config, Arc::new(InMemoryOrderRepository::new()), registry, cors).await
        }
    }
}

async fn serve<R: OrderRepositoryPort + 'static>(
    config: &AppConfig,
    repository: Arc<R>,
    registry: GatewayRegistry,
    cors: CorsLayer,
) -> anyhow::Result<()> {
    let payment_service = Arc::new(PaymentService::new(
        repository,
        registry,
        config.public_base_url.clone(),
        config.require_webhook_signatures,
    ));

    let app = api::create_router(AppState { payment_service }, cors);

    let addr = config.bind_addr();
    info!("Server listening on {}", addr);
    info!("Available endpoints:");
    info!("  GET  /health - Health check");
    info!("  POST /api/payments - Create payment");
    info!("  GET  /api/orders/:order_id - Order snapshot");
    info!("  POST /api/webhooks/:gateway - Gateway webhook");
    info!("  POST /api/payments/:gateway/verify - Client verification");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
