use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::parse_cursor;
use crate::models::{OrderRecord, StatusFilter};
use crate::store::PageKey;
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 25;

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    filter: StatusFilter,
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    orders: Vec<OrderRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<PageKey>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let cursor = parse_cursor(params.cursor)?;
    let page = state
        .services
        .orders
        .history(
            &user,
            params.filter,
            params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            cursor,
        )
        .await?;
    Ok(Json(HistoryResponse {
        orders: page.orders,
        next_cursor: page.next_cursor,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(intent): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(&user, &intent).await?;
    Ok(Json(order))
}
