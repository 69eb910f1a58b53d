use super::{AppState, error::ApiResult};
use crate::{
    core::product::{self, NewProduct, ProductChanges, ProductView},
    entities::ProductModel,
    errors::Error,
};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct ThresholdParams {
    pub threshold: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductView>>> {
    Ok(Json(product::get_all_products(&state.db).await?))
}

async fn low_stock_products(
    State(state): State<AppState>,
    params: Result<Query<ThresholdParams>, QueryRejection>,
) -> ApiResult<Json<Vec<ProductView>>> {
    let Query(params) = params?;
    let threshold = params.threshold.unwrap_or(state.low_stock_threshold);
    Ok(Json(
        product::get_low_stock_products(&state.db, threshold).await?,
    ))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductView>> {
    product::get_product_view(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Product", id).into())
}

async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProductModel>)> {
    let Json(new) = body?;
    let created = product::create_product(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProductChanges>, JsonRejection>,
) -> ApiResult<Json<ProductModel>> {
    let Json(changes) = body?;
    Ok(Json(product::update_product(&state.db, &id, changes).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    product::delete_product(&state.db, &id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
