use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storefront_api::config::{init_tracing, load_config};
use storefront_api::payments::stripe::StripeGateway;
use storefront_api::store::sql::{SqlOrderStore, SqlProductStore};
use storefront_api::{app_router, db, AppServices, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config().context("loading configuration")?;
    init_tracing(&cfg.log_level, cfg.log_json);

    let conn = db::connect(&cfg).await.context("connecting to database")?;
    if cfg.auto_migrate {
        db::run_migrations(&conn)
            .await
            .context("running database migrations")?;
    }
    let conn = Arc::new(conn);

    let products = Arc::new(SqlProductStore::new(conn.clone(), cfg.read_page_size));
    let orders = Arc::new(SqlOrderStore::new(conn, cfg.read_page_size));
    let secret = cfg
        .payment_secret_key
        .clone()
        .context("payment_secret_key is not configured")?;
    let processor = Arc::new(StripeGateway::new(secret));

    let config = Arc::new(cfg);
    let services = Arc::new(AppServices::new(products, orders, processor, &config));
    let state = AppState {
        config: config.clone(),
        services,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
