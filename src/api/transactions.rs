//! Transaction routes. Every write goes through the stock ledger.

use super::{AppState, error::ApiResult};
use crate::{
    core::ledger::{self, NewTransaction, TransactionChanges, TransactionView},
    entities::TransactionModel,
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
        .route("/", get(list_transactions).post(create_transaction))
        .route(
            "/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

async fn list_transactions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TransactionView>>> {
    Ok(Json(ledger::get_all_transactions(&state.db).await?))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionView>> {
    ledger::get_transaction_view(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Transaction", id).into())
}

async fn create_transaction(
    State(state): State<AppState>,
    body: Result<Json<NewTransaction>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransactionModel>)> {
    let Json(new) = body?;
    let created = state.ledger.create_transaction(new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TransactionChanges>, JsonRejection>,
) -> ApiResult<Json<TransactionModel>> {
    let Json(changes) = body?;
    Ok(Json(state.ledger.update_transaction(&id, changes).await?))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.ledger.delete_transaction(&id).await?;
    Ok(Json(json!({ "message": "Transaction deleted successfully" })))
}
