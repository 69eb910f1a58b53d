use super::{AppState, error::ApiResult};
use crate::{
    core::supplier::{self, NewSupplier, SupplierChanges},
    entities::SupplierModel,
    errors::Error,
};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
}

async fn list_suppliers(State(state): State<AppState>) -> ApiResult<Json<Vec<SupplierModel>>> {
    Ok(Json(supplier::get_all_suppliers(&state.db).await?))
}

async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SupplierModel>> {
    supplier::get_supplier_by_id(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Supplier", id).into())
}

async fn create_supplier(
    State(state): State<AppState>,
    body: Result<Json<NewSupplier>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SupplierModel>)> {
    let Json(new) = body?;
    let created = supplier::create_supplier(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SupplierChanges>, JsonRejection>,
) -> ApiResult<Json<SupplierModel>> {
    let Json(changes) = body?;
    Ok(Json(
        supplier::update_supplier(&state.db, &id, changes).await?,
    ))
}

async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    supplier::delete_supplier(&state.db, &id).await?;
    Ok(Json(json!({ "message": "Supplier deleted successfully" })))
}
