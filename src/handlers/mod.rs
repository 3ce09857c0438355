//! HTTP surface. Handlers stay thin: extract, delegate to a service, shape
//! the response. All business rules live in [`crate::services`].

pub mod carts;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;

use crate::errors::ServiceError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/cart", get(carts::get_cart).put(carts::replace_cart))
        .route("/cart/merge", post(carts::merge_cart))
        .route("/checkout", post(checkout::checkout))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:intent", get(orders::get_order))
        .route("/payments/webhook", post(webhooks::payment_webhook))
}

/// Continuation cursors travel as JSON in a query parameter, echoed back to
/// the client verbatim from the previous page response.
pub(crate) fn parse_cursor<K: DeserializeOwned>(raw: Option<String>) -> Result<Option<K>, ServiceError> {
    raw.map(|s| serde_json::from_str(&s).map_err(|_| ServiceError::BadRequest("invalid cursor".into())))
        .transpose()
}
