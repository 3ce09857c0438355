use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::carts::CartLine;
use crate::AppState;

#[derive(Deserialize)]
pub struct CartBody {
    #[serde(default)]
    items: Vec<CartLine>,
}

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(&user).await?;
    Ok(Json(cart))
}

/// Merges locally-held lines (from a pre-login device cart) into the
/// persisted cart and returns the merged record.
pub async fn merge_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CartBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.merge(&user, body.items).await?;
    Ok(Json(cart))
}

/// Rewrites the cart to exactly the submitted lines.
pub async fn replace_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CartBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.replace(&user, body.items).await?;
    Ok(Json(cart))
}
