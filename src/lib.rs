//! Storefront order lifecycle API.
//!
//! One order record per user and payment intent, with the open cart stored
//! under a sentinel intent key. Carts are merged and repriced from the
//! canonical catalog, checkout opens a payment intent, and processor
//! webhooks drive the record through the payment state machine.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod payments;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::payments::PaymentProcessor;
use crate::services::carts::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderQueryService;
use crate::services::payment_events::PaymentEventService;
use crate::store::{OrderStore, ProductStore};

/// The wired service layer, shared across handlers.
pub struct AppServices {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderQueryService,
    pub payment_events: PaymentEventService,
}

impl AppServices {
    pub fn new(
        products: Arc<dyn ProductStore>,
        orders: Arc<dyn OrderStore>,
        processor: Arc<dyn PaymentProcessor>,
        config: &AppConfig,
    ) -> Self {
        Self {
            catalog: CatalogService::new(products.clone()),
            carts: CartService::new(products, orders.clone()),
            checkout: CheckoutService::new(orders.clone(), processor, config.currency.clone()),
            orders: OrderQueryService::new(orders.clone()),
            payment_events: PaymentEventService::new(orders),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<AppServices>,
}

/// Builds the application router with the full middleware stack.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", handlers::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
