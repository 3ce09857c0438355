use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::checkout::CheckoutInput;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    client_secret: String,
    amount: Decimal,
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(input): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state.services.checkout.checkout(&user, input).await?;
    Ok(Json(CheckoutResponse {
        client_secret: receipt.client_secret,
        amount: receipt.amount,
    }))
}
