use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::handlers::parse_cursor;
use crate::models::Product;
use crate::services::catalog::{CreateProductInput, UpdateProductInput};
use crate::store::ProductKey;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 25;

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListResponse {
    products: Vec<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<ProductKey>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let cursor = parse_cursor(params.cursor)?;
    let page = state
        .services
        .catalog
        .list_products(params.limit.unwrap_or(DEFAULT_LIST_LIMIT), cursor)
        .await?;
    Ok(Json(ProductListResponse {
        products: page.products,
        next_cursor: page.next_cursor,
    }))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(&id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.update_product(&id, input).await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
